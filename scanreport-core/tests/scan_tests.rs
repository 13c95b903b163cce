use scanreport_core::{
    CancelFlag, ColumnSpec, CsvSource, Interrupter, LogProgress, MemorySource, MemoryTable,
    ProgressSink, Result, Row, ScanConfig, ScanError, ScanOrchestrator, ScanOutcome,
};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn write_csv(dir: &Path, name: &str, lines: &[String]) {
    let mut file = std::fs::File::create(dir.join(name)).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
}

fn tables(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn completed(outcome: ScanOutcome) -> scanreport_core::ScanReport {
    match outcome {
        ScanOutcome::Completed(report) => report,
        other => panic!("scan did not complete: {other:?}"),
    }
}

#[tokio::test]
async fn test_csv_scan_with_empty_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = vec!["id,name".to_string(), "1,Alice".to_string(), "2,Bob".to_string()];
    lines.extend((0..500).map(|_| "3,".to_string()));
    write_csv(dir.path(), "person.csv", &lines);

    let orchestrator = ScanOrchestrator::new(
        Arc::new(CsvSource::new(dir.path())),
        ScanConfig::default(),
    );
    let report = completed(orchestrator.scan(&tables(&["person.csv"])).await.unwrap());

    let table = report.table("person.csv").unwrap();
    assert_eq!(table.rows_checked, 502);
    assert_eq!(table.row_count, Some(502));

    let id = table.column("id").unwrap();
    assert_eq!(id.type_label, "int");

    let name = table.column("name").unwrap();
    assert_eq!(name.type_label, "varchar");
    assert!((name.empty_fraction - 500.0 / 502.0).abs() < 1e-9);
    assert_eq!(name.unique_count, 3);
    assert!(!name.unique_count_at_least);

    let values: Vec<(&str, u64)> = name
        .values
        .iter()
        .map(|v| (v.value.as_str(), v.count))
        .collect();
    assert_eq!(values, vec![("", 500), ("Alice", 1), ("Bob", 1)]);
    assert!(!name.values_truncated);
}

#[tokio::test]
async fn test_malformed_row_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(
        dir.path(),
        "t.csv",
        &tables(&["a,b", "1,x", "2,y,extra", "3,z"]),
    );

    let orchestrator =
        ScanOrchestrator::new(Arc::new(CsvSource::new(dir.path())), ScanConfig::default());
    let report = completed(orchestrator.scan(&tables(&["t.csv"])).await.unwrap());

    let table = report.table("t.csv").unwrap();
    assert_eq!(table.rows_checked, 2);
    assert_eq!(table.malformed_rows, 1);
    for column in &table.columns {
        assert_eq!(column.rows_checked, 2);
    }
    assert_eq!(table.column("b").unwrap().values.len(), 2);
}

#[tokio::test]
async fn test_sample_size_caps_rows() {
    let rows: Vec<Row> = (0..50).map(|i| Row::from(vec![i.to_string()])).collect();
    let source = MemorySource::new().with_table(
        "numbers",
        MemoryTable::new(vec![ColumnSpec::new("n")], rows),
    );

    let config = ScanConfig {
        sample_size: 10,
        ..ScanConfig::default()
    };
    let report = completed(
        ScanOrchestrator::new(Arc::new(source.clone()), config)
            .scan(&tables(&["numbers"]))
            .await
            .unwrap(),
    );
    let table = report.table("numbers").unwrap();
    assert_eq!(table.rows_checked, 10);
    assert_eq!(table.row_count, Some(50));

    let config = ScanConfig {
        sample_size: -1,
        ..ScanConfig::default()
    };
    let report = completed(
        ScanOrchestrator::new(Arc::new(source), config)
            .scan(&tables(&["numbers"]))
            .await
            .unwrap(),
    );
    assert_eq!(report.table("numbers").unwrap().rows_checked, 50);
}

#[tokio::test]
async fn test_failing_table_does_not_stop_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "good.csv", &tables(&["x", "1", "2"]));

    let progress = Arc::new(LogProgress::new());
    let orchestrator =
        ScanOrchestrator::new(Arc::new(CsvSource::new(dir.path())), ScanConfig::default())
            .with_progress(progress.clone());
    let report = completed(
        orchestrator
            .scan(&tables(&["missing.csv", "good.csv"]))
            .await
            .unwrap(),
    );

    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].table, "good.csv");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].table, "missing.csv");
    assert_eq!(progress.done(), 2);
    assert_eq!(progress.total(), 2);
}

#[tokio::test]
async fn test_empty_tables_are_left_out() {
    let source = MemorySource::new()
        .with_table("no_columns", MemoryTable::default())
        .with_table(
            "no_rows",
            MemoryTable::new(vec![ColumnSpec::new("a")], Vec::new()),
        )
        .with_table(
            "data",
            MemoryTable::new(vec![ColumnSpec::new("a")], vec![Row::from(vec!["1"])]),
        );

    let report = completed(
        ScanOrchestrator::new(Arc::new(source), ScanConfig::default())
            .scan(&tables(&["no_columns", "no_rows", "data"]))
            .await
            .unwrap(),
    );

    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].table, "data");
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_tables_keep_request_order() {
    let mut source = MemorySource::new();
    let names: Vec<String> = (0..8).map(|i| format!("t{}", i)).collect();
    for (i, name) in names.iter().enumerate() {
        let rows = (0..(100 * (8 - i))).map(|r| Row::from(vec![r.to_string()])).collect();
        source.insert(name.clone(), MemoryTable::new(vec![ColumnSpec::new("v")], rows));
    }

    let config = ScanConfig {
        max_concurrent_tables: 3,
        ..ScanConfig::default()
    };
    let report = completed(
        ScanOrchestrator::new(Arc::new(source), config)
            .scan(&names)
            .await
            .unwrap(),
    );

    let order: Vec<&str> = report.tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(order, names.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_empty_table_list_is_a_configuration_error() {
    let orchestrator = ScanOrchestrator::new(Arc::new(MemorySource::new()), ScanConfig::default());
    assert!(matches!(
        orchestrator.scan(&[]).await,
        Err(ScanError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_invalid_reservoir_size_fails_before_scanning() {
    let config = ScanConfig {
        calculate_numeric_stats: true,
        numeric_stats_sampler_size: 0,
        ..ScanConfig::default()
    };
    let orchestrator = ScanOrchestrator::new(Arc::new(MemorySource::new()), config);
    assert!(matches!(
        orchestrator.scan(&tables(&["t"])).await,
        Err(ScanError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_cancel_before_start() {
    let source = MemorySource::new().with_table(
        "t",
        MemoryTable::new(vec![ColumnSpec::new("a")], vec![Row::from(vec!["1"])]),
    );
    let flag = CancelFlag::new();
    flag.cancel();

    let outcome = ScanOrchestrator::new(Arc::new(source), ScanConfig::default())
        .with_interrupter(Arc::new(flag))
        .scan(&tables(&["t"]))
        .await
        .unwrap();

    assert!(outcome.is_canceled());
    assert!(outcome.report().tables.is_empty());
    assert!(outcome.report().failures.is_empty());
}

/// Requests cancellation after a number of polls
struct CancelAfter {
    polls: AtomicUsize,
    limit: usize,
}

impl Interrupter for CancelAfter {
    fn check_interrupted(&self) -> Result<()> {
        if self.polls.fetch_add(1, Ordering::SeqCst) >= self.limit {
            Err(ScanError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn test_cancel_mid_table_discards_partial_profile() {
    let rows: Vec<Row> = (0..10_000).map(|i| Row::from(vec![i.to_string()])).collect();
    let source = MemorySource::new().with_table(
        "big",
        MemoryTable::new(vec![ColumnSpec::new("n")], rows),
    );

    let config = ScanConfig {
        interrupt_check_interval: 100,
        max_concurrent_tables: 1,
        ..ScanConfig::default()
    };
    // Scheduler poll and table-start poll pass, then a few row batches
    let interrupter = Arc::new(CancelAfter {
        polls: AtomicUsize::new(0),
        limit: 5,
    });
    let outcome = ScanOrchestrator::new(Arc::new(source), config)
        .with_interrupter(interrupter)
        .scan(&tables(&["big"]))
        .await
        .unwrap();

    assert!(outcome.is_canceled());
    assert!(outcome.report().tables.is_empty());
}

#[tokio::test]
async fn test_numeric_stats_in_report() {
    let rows: Vec<Row> = (1..=9).map(|i| Row::from(vec![i.to_string()])).collect();
    let source = MemorySource::new().with_table(
        "t",
        MemoryTable::new(vec![ColumnSpec::with_type("v", "integer")], rows),
    );

    let config = ScanConfig {
        calculate_numeric_stats: true,
        ..ScanConfig::default()
    };
    let report = completed(
        ScanOrchestrator::new(Arc::new(source), config)
            .scan(&tables(&["t"]))
            .await
            .unwrap(),
    );

    let column = report.table("t").unwrap().column("v").unwrap();
    assert_eq!(column.type_label, "integer");
    let numeric = column.numeric.as_ref().unwrap();
    assert_eq!(numeric.min, 1.0);
    assert_eq!(numeric.max, 9.0);
    assert_eq!(numeric.mean, 5.0);
    assert_eq!((numeric.p25, numeric.p50, numeric.p75), (2.5, 5.0, 7.5));
}

#[tokio::test]
async fn test_free_text_column_end_to_end() {
    let rows: Vec<Row> = (0..1500)
        .map(|i| {
            Row::from(vec![format!(
                "Visit {} notes: the patient described intermittent headaches and was referred for further neurological evaluation",
                i
            )])
        })
        .collect();
    let source = MemorySource::new().with_table(
        "notes",
        MemoryTable::new(vec![ColumnSpec::new("text")], rows),
    );

    let report = completed(
        ScanOrchestrator::new(Arc::new(source), ScanConfig::default())
            .scan(&tables(&["notes"]))
            .await
            .unwrap(),
    );

    let column = report.table("notes").unwrap().column("text").unwrap();
    assert_eq!(column.type_label, "text");
    assert!(column.free_text);
    let patient = column.values.iter().find(|v| v.value == "patient").unwrap();
    assert_eq!(patient.count, 1500);
}

#[test]
fn test_progress_sink_is_object_safe() {
    let sink: Arc<dyn ProgressSink> = Arc::new(LogProgress::new());
    sink.set_total(1);
    sink.advance();
}

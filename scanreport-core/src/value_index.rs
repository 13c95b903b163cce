//! Bounded frequency index over observed values (or word tokens)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value (or token) together with the number of times it was seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

/// Result of [`ValueFrequencyIndex::top_entries_at_least`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopValues {
    pub entries: Vec<ValueCount>,
    /// Set when more entries qualified than the requested limit
    pub truncated: bool,
}

/// Multiset of strings with top-N retention.
///
/// Counts are exact until the first [`trim`](Self::trim) that discards an
/// entry. After that the index is marked trimmed: discarded values are gone
/// for good, and a later re-occurrence is counted as a new distinct value.
#[derive(Debug, Clone, Default)]
pub struct ValueFrequencyIndex {
    counts: HashMap<String, u64>,
    trimmed: bool,
}

impl ValueFrequencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `value`. Returns `true` when the value was
    /// not present before this call.
    pub fn add(&mut self, value: &str) -> bool {
        self.add_count(value, 1)
    }

    /// Count `count` occurrences of `value` at once.
    pub fn add_count(&mut self, value: &str, count: u64) -> bool {
        match self.counts.get_mut(value) {
            Some(existing) => {
                *existing += count;
                false
            }
            None => {
                self.counts.insert(value.to_string(), count);
                true
            }
        }
    }

    /// Occurrences recorded for `value` (0 if absent or discarded)
    pub fn count(&self, value: &str) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn is_trimmed(&self) -> bool {
        self.trimmed
    }

    /// Keep only the `top_n` most frequent entries. Returns the number of
    /// entries discarded; a second call with the same `top_n` discards none.
    pub fn trim(&mut self, top_n: usize) -> usize {
        if self.counts.len() <= top_n {
            return 0;
        }

        let mut entries: Vec<(String, u64)> = self.counts.drain().collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let discarded = entries.len() - top_n;
        entries.truncate(top_n);

        self.counts = entries.into_iter().collect();
        self.trimmed = true;
        discarded
    }

    /// Entries seen at least `min_count` times, most frequent first (ties
    /// ordered by value), cut to `limit`.
    pub fn top_entries_at_least(&self, min_count: u64, limit: usize) -> TopValues {
        let mut entries: Vec<ValueCount> = self
            .counts
            .iter()
            .filter(|(_, &count)| count >= min_count)
            .map(|(value, &count)| ValueCount {
                value: value.clone(),
                count,
            })
            .collect();
        entries.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));

        let truncated = entries.len() > limit;
        entries.truncate(limit);

        TopValues { entries, truncated }
    }

    /// Iterate over all retained `(value, count)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(value, &count)| (value.as_str(), count))
    }
}

// Capture snapshot: the sole persisted artifact

use super::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata describing one finished capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    /// Channel/conversation display name
    pub source_name: String,
    #[serde(with = "super::iso_millis")]
    pub captured_at: DateTime<Utc>,
    pub total_records: usize,
    /// Wall-clock duration of the whole capture
    pub duration_ms: u64,
}

/// Immutable result of a capture, ordered by timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: CaptureMetadata,
    pub records: Vec<Record>,
}

impl Snapshot {
    /// Thread numbering over the ordered records
    pub fn thread_numbers(&self) -> ThreadIndex {
        ThreadIndex::build(&self.records)
    }
}

/// 1-based thread numbers assigned in order of first observation
#[derive(Debug, Clone, Default)]
pub struct ThreadIndex {
    numbers: HashMap<String, usize>,
}

impl ThreadIndex {
    pub fn build(records: &[Record]) -> Self {
        let mut numbers = HashMap::new();
        for thread_id in records.iter().filter_map(|r| r.thread_id.as_ref()) {
            let next = numbers.len() + 1;
            numbers.entry(thread_id.clone()).or_insert(next);
        }
        Self { numbers }
    }

    pub fn number(&self, thread_id: &str) -> Option<usize> {
        self.numbers.get(thread_id).copied()
    }

    /// Thread number of a record, if it has a thread
    pub fn number_of(&self, record: &Record) -> Option<usize> {
        record.thread_id.as_deref().and_then(|t| self.number(t))
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

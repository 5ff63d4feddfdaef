// Dedup collector: insertion-ordered record set keyed by dedup identity

use crate::models::{DedupKey, Record};
use std::collections::HashSet;

/// Accumulates records, keeping only the first sighting of each dedup key
#[derive(Debug, Default)]
pub struct DedupCollector {
    seen: HashSet<DedupKey>,
    records: Vec<Record>,
}

impl DedupCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; returns false if its key was already collected or it is invalid
    pub fn add(&mut self, record: Record) -> bool {
        if !record.is_valid() {
            return false;
        }
        if !self.seen.insert(record.dedup_key()) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Add many records, returning how many were new
    pub fn extend<I: IntoIterator<Item = Record>>(&mut self, records: I) -> usize {
        records
            .into_iter()
            .map(|record| self.add(record))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Close the collector and take the records in insertion order
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

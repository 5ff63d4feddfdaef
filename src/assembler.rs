// Snapshot assembly: ordering and capture metadata

use crate::models::{CaptureMetadata, Record, Snapshot};
use crate::source::DomSource;
use crate::utils::collapse_whitespace;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Display name of the conversation: header selectors, then the page title, then `fallback`
pub fn resolve_source_name<S: DomSource>(source: &S, selectors: &[String], fallback: &str) -> String {
    selectors
        .iter()
        .find_map(|selector| {
            let node = source.query_document(selector)?;
            let text = collapse_whitespace(&source.read_text(&node));
            (!text.is_empty()).then_some(text)
        })
        .or_else(|| source.title())
        .unwrap_or_else(|| fallback.to_string())
}

/// Stable sort by timestamp ascending; unknown timestamps sort first
pub fn order_records(records: &mut [Record]) {
    records.sort_by_key(Record::sort_key);
}

/// Order records and package them with capture metadata
pub fn assemble(
    mut records: Vec<Record>,
    source_name: String,
    captured_at: DateTime<Utc>,
    duration: Duration,
) -> Snapshot {
    order_records(&mut records);

    Snapshot {
        metadata: CaptureMetadata {
            source_name,
            captured_at,
            total_records: records.len(),
            duration_ms: duration.as_millis() as u64,
        },
        records,
    }
}

// Conversation record and its dedup identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One harvested conversation message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Stable message identifier, without the UI namespace prefix
    pub id: Option<String>,
    /// Root message of the thread this record belongs to
    pub thread_id: Option<String>,
    /// Instant the message was sent
    #[serde(default, with = "super::iso_millis::option")]
    pub timestamp: Option<DateTime<Utc>>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    /// Whitespace-normalized message body
    pub text: String,
}

/// Key used to suppress duplicate sightings of the same message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Id(String),
    Composite {
        timestamp: Option<i64>,
        author_id: Option<String>,
        text: String,
    },
}

impl Record {
    /// A record carries information only if it has an id or some text
    pub fn is_valid(&self) -> bool {
        self.id.is_some() || !self.text.is_empty()
    }

    pub fn dedup_key(&self) -> DedupKey {
        match &self.id {
            Some(id) => DedupKey::Id(id.clone()),
            None => DedupKey::Composite {
                timestamp: self.timestamp.map(|t| t.timestamp_millis()),
                author_id: self.author_id.clone(),
                text: self.text.clone(),
            },
        }
    }

    /// Whether the backend could fill something in for this record
    pub fn needs_enrichment(&self) -> bool {
        self.id.is_some()
            && (self.author_id.is_none()
                || self.timestamp.is_none()
                || self.thread_id.is_none()
                || self.text.is_empty())
    }

    /// Ordering key in epoch milliseconds; unknown timestamps sort as the epoch
    pub fn sort_key(&self) -> i64 {
        self.timestamp.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: Option<&str>, text: &str) -> Record {
        Record {
            id: id.map(String::from),
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validity_requires_id_or_text() {
        assert!(record(Some("p1"), "").is_valid());
        assert!(record(None, "hello").is_valid());
        assert!(!record(None, "").is_valid());
    }

    #[test]
    fn test_dedup_key_prefers_id() {
        let a = record(Some("p1"), "first");
        let b = record(Some("p1"), "edited later");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_composite_key_distinguishes_authors() {
        let mut a = record(None, "same words");
        let mut b = record(None, "same words");
        a.author_id = Some("u1".to_string());
        b.author_id = Some("u2".to_string());
        assert_ne!(a.dedup_key(), b.dedup_key());

        b.author_id = Some("u1".to_string());
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_needs_enrichment() {
        let complete = Record {
            id: Some("p1".to_string()),
            thread_id: Some("p1".to_string()),
            timestamp: Some(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()),
            author_id: Some("u1".to_string()),
            author_name: None,
            text: "hi".to_string(),
        };
        assert!(!complete.needs_enrichment());

        let mut no_text = complete.clone();
        no_text.text.clear();
        assert!(no_text.needs_enrichment());

        let mut no_id = no_text.clone();
        no_id.id = None;
        assert!(!no_id.needs_enrichment());
    }

    #[test]
    fn test_sort_key_defaults_to_epoch() {
        assert_eq!(record(Some("p1"), "").sort_key(), 0);
    }

    #[test]
    fn test_serializes_camel_case_with_millis() {
        let r = Record {
            id: Some("p1".to_string()),
            thread_id: Some("p0".to_string()),
            timestamp: Some(Utc.timestamp_millis_opt(1_709_287_200_000).unwrap()),
            author_id: None,
            author_name: Some("alice".to_string()),
            text: "hi".to_string(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["threadId"], "p0");
        assert_eq!(json["timestamp"], "2024-03-01T10:00:00.000Z");
        assert_eq!(json["authorName"], "alice");
        assert!(json["authorId"].is_null());

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}

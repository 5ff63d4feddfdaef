// Capture status events
// Sent to whoever triggered a capture so it can show progress (badge, log line, ...)

use serde::{Deserialize, Serialize};

pub const EVENT_CAPTURE_STATUS: &str = "capture:status";

/// Lifecycle of one capture as seen by the trigger side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    Idle,
    Running,
    Done,
    Error,
}

impl CaptureStatus {
    /// Short indicator text for a toolbar badge
    pub fn badge_text(&self) -> &'static str {
        match self {
            CaptureStatus::Idle => "",
            CaptureStatus::Running => "⋯",
            CaptureStatus::Done => "✓",
            CaptureStatus::Error => "!",
        }
    }
}

/// Payload for capture status events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatusPayload {
    pub capture_id: String,
    pub status: CaptureStatus,
    /// Error message when `status` is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_records: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_text() {
        assert_eq!(CaptureStatus::Idle.badge_text(), "");
        assert_eq!(CaptureStatus::Done.badge_text(), "✓");
        assert_eq!(CaptureStatus::Error.badge_text(), "!");
    }

    #[test]
    fn test_payload_serialization() {
        let payload = CaptureStatusPayload {
            capture_id: "c1".to_string(),
            status: CaptureStatus::Done,
            message: None,
            total_records: Some(12),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["captureId"], "c1");
        assert_eq!(json["status"], "done");
        assert_eq!(json["totalRecords"], 12);
        assert!(json.get("message").is_none());
    }
}

//! Messages posted to the worker from app pages.

use serde::Deserialize;

/// A recognised page-to-worker message: `{ "type": ..., "payload": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate the waiting worker now.
    SkipWaiting,
    /// Display a notification built from `payload` as if it had been pushed.
    TestNotification {
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl WorkerMessage {
    /// Interprets a posted message. Unknown or malformed messages yield `None`.
    #[must_use]
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        match Self::deserialize(value) {
            Ok(message) => Some(message),
            Err(e) => {
                log::debug!("Ignoring message {value}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_skip_waiting() {
        assert_eq!(
            WorkerMessage::parse(&json!({"type": "SKIP_WAITING"})),
            Some(WorkerMessage::SkipWaiting)
        );
    }

    #[test]
    fn parses_test_notification_with_payload() {
        let message = WorkerMessage::parse(&json!({
            "type": "TEST_NOTIFICATION",
            "payload": {"title": "Test order"}
        }));
        assert_eq!(
            message,
            Some(WorkerMessage::TestNotification {
                payload: json!({"title": "Test order"})
            })
        );
    }

    #[test]
    fn test_notification_payload_is_optional() {
        assert_eq!(
            WorkerMessage::parse(&json!({"type": "TEST_NOTIFICATION"})),
            Some(WorkerMessage::TestNotification {
                payload: serde_json::Value::Null
            })
        );
    }

    #[test]
    fn ignores_unknown_and_malformed() {
        assert_eq!(WorkerMessage::parse(&json!({"type": "PING"})), None);
        assert_eq!(WorkerMessage::parse(&json!({"kind": "SKIP_WAITING"})), None);
        assert_eq!(WorkerMessage::parse(&json!("SKIP_WAITING")), None);
        assert_eq!(WorkerMessage::parse(&serde_json::Value::Null), None);
    }
}

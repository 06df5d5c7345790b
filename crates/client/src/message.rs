//! Control messages posted from the application to the controller.

use serde::Deserialize;
use shellcache_core::Error;

/// Instructions the foreground application can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate the installing version without waiting for open tabs to close.
    SkipWaiting,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Parse a posted JSON message.
///
/// Messages with an unknown or missing `type` are not errors; they are
/// returned as `None` so other listeners on the channel can handle them.
pub fn parse(json: &str) -> Result<Option<ControlMessage>, Error> {
    let envelope: Envelope = serde_json::from_str(json).map_err(|e| Error::InvalidMessage(e.to_string()))?;

    match envelope.kind.as_deref() {
        Some("SKIP_WAITING") => Ok(Some(ControlMessage::SkipWaiting)),
        other => {
            tracing::debug!(kind = ?other, "ignoring control message");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skip_waiting() {
        assert_eq!(parse(r#"{"type":"SKIP_WAITING"}"#).unwrap(), Some(ControlMessage::SkipWaiting));
    }

    #[test]
    fn test_parse_unknown_type_ignored() {
        assert_eq!(parse(r#"{"type":"RECORDING_SAVED","id":3}"#).unwrap(), None);
        assert_eq!(parse(r#"{}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(parse("SKIP_WAITING"), Err(Error::InvalidMessage(_))));
        assert!(matches!(parse("[1,2]"), Err(Error::InvalidMessage(_))));
    }
}

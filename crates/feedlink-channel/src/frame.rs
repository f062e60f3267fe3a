//! Wire frames on the notification channel.
//!
//! Text frames are either the bare heartbeat tokens or a JSON envelope:
//! `{"type":"notification","title":"...","message":"...","id":...}`.

use feedlink_core::error::{FeedError, Result};
use feedlink_core::types::FeedItem;

pub const HEARTBEAT_REQUEST: &str = "ping";
pub const HEARTBEAT_RESPONSE: &str = "pong";

/// A decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Peer asks for a liveness reply.
    HeartbeatRequest,
    /// Reply to our own ping; never forwarded to consumers.
    HeartbeatResponse,
    /// A pushed feed item.
    Notification(FeedItem),
    /// Well-formed envelope of a type we do not handle.
    Ignored(String),
}

/// Decode one text frame. Malformed JSON and notification envelopes that do
/// not describe a feed item are `Protocol` errors; the caller drops them.
pub fn parse_frame(text: &str) -> Result<Frame> {
    let trimmed = text.trim();
    match trimmed {
        HEARTBEAT_REQUEST => return Ok(Frame::HeartbeatRequest),
        HEARTBEAT_RESPONSE => return Ok(Frame::HeartbeatResponse),
        _ => {}
    }

    let json: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| FeedError::Protocol(format!("Invalid JSON frame: {e}")))?;
    if !json.is_object() {
        return Err(FeedError::Protocol("Frame is not a JSON object".into()));
    }

    let frame_type = json["type"].as_str().unwrap_or("").to_string();
    match frame_type.as_str() {
        "notification" => {
            let item: FeedItem = serde_json::from_value(json)
                .map_err(|e| FeedError::Protocol(format!("Invalid notification: {e}")))?;
            Ok(Frame::Notification(item))
        }
        HEARTBEAT_REQUEST => Ok(Frame::HeartbeatRequest),
        HEARTBEAT_RESPONSE => Ok(Frame::HeartbeatResponse),
        _ => Ok(Frame::Ignored(frame_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedlink_core::types::FeedLevel;

    #[test]
    fn test_heartbeat_tokens() {
        assert_eq!(parse_frame("ping").unwrap(), Frame::HeartbeatRequest);
        assert_eq!(parse_frame(" pong\n").unwrap(), Frame::HeartbeatResponse);
        assert_eq!(parse_frame(r#"{"type":"pong"}"#).unwrap(), Frame::HeartbeatResponse);
    }

    #[test]
    fn test_notification_envelope() {
        let text = r#"{
            "type": "notification",
            "id": 17,
            "title": "Redpacket claimed",
            "message": "account 3 claimed a redpacket in group A",
            "level": "medium",
            "created_at": "2024-06-01T08:30:00Z"
        }"#;
        match parse_frame(text).unwrap() {
            Frame::Notification(item) => {
                assert_eq!(item.id, "17");
                assert_eq!(item.title, "Redpacket claimed");
                assert_eq!(item.body, "account 3 claimed a redpacket in group A");
                assert_eq!(item.level, FeedLevel::Medium);
                assert!(!item.acknowledged);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_other_types_ignored() {
        assert_eq!(
            parse_frame(r#"{"type":"connected","message":"hi"}"#).unwrap(),
            Frame::Ignored("connected".into())
        );
        assert_eq!(parse_frame(r#"{"hello":1}"#).unwrap(), Frame::Ignored(String::new()));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(parse_frame("{not json"), Err(FeedError::Protocol(_))));
        assert!(matches!(parse_frame("[1,2]"), Err(FeedError::Protocol(_))));
        // notification without an id cannot be stored
        assert!(matches!(
            parse_frame(r#"{"type":"notification","title":"x"}"#),
            Err(FeedError::Protocol(_))
        ));
    }
}

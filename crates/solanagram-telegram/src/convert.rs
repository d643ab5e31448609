// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation between teloxide types and Solanagram's messaging types.
//!
//! Errors are classified into the worker's taxonomy here so the
//! connection supervisor never has to look at a teloxide error.

use std::time::Duration;

use solanagram_core::{InboundEvent, SolanagramError};
use teloxide::types::{ChatId, Message, Recipient, Update, UpdateKind};
use teloxide::{ApiError, RequestError};

/// Classifies a Bot API failure.
///
/// `RetryAfter` carries the provider's mandatory wait, network and
/// decoding failures are transient, an invalid token means the session
/// must be recreated. Everything else is reported as backend unavailable.
pub fn classify(err: RequestError) -> SolanagramError {
    match err {
        RequestError::RetryAfter(secs) => SolanagramError::RateLimited {
            wait: secs.duration(),
        },
        RequestError::Api(ApiError::InvalidToken) => {
            SolanagramError::AuthRequired("bot token rejected by the Bot API".to_string())
        }
        RequestError::Network(_) | RequestError::Io(_) | RequestError::InvalidJson { .. } => {
            SolanagramError::Transient {
                message: "telegram connection failed".to_string(),
                source: Some(Box::new(err)),
            }
        }
        other => SolanagramError::RuntimeUnavailable {
            message: "telegram request failed".to_string(),
            source: Some(Box::new(other)),
        },
    }
}

/// Parses a forward target: `@username` or a numeric chat id.
pub fn recipient(target: &str) -> Result<Recipient, SolanagramError> {
    let target = target.trim();
    if target.starts_with('@') && target.len() > 1 {
        return Ok(Recipient::ChannelUsername(target.to_string()));
    }
    target
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| SolanagramError::Config(format!("invalid forward target `{target}`")))
}

/// Message carried by an update, when it is a plain or channel post.
pub fn update_message(update: &Update) -> Option<&Message> {
    match &update.kind {
        UpdateKind::Message(msg) | UpdateKind::ChannelPost(msg) => Some(msg),
        _ => None,
    }
}

/// Converts a Bot API message into an inbound event. Media captions count
/// as text so extraction rules also see them.
pub fn to_event(msg: &Message) -> InboundEvent {
    let text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string();
    InboundEvent {
        channel_id: msg.chat.id.0,
        message_id: i64::from(msg.id.0),
        sender_id: msg.from.as_ref().map(|u| u.id.0 as i64),
        text,
        timestamp: msg.date,
        raw: serde_json::to_value(msg).unwrap_or(serde_json::Value::Null),
    }
}

/// Long-poll timeout handed to `getUpdates`.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_post(chat_id: i64, message_id: i32, text: &str) -> Update {
        // teloxide's `UpdateKind` deserializer borrows its keys, so it must
        // be fed from a string rather than a `serde_json::Value`.
        serde_json::from_str(&serde_json::json!({
            "update_id": 10,
            "channel_post": {
                "message_id": message_id,
                "date": 1_700_000_000,
                "chat": {"id": chat_id, "type": "channel", "title": "Alpha Group"},
                "text": text
            }
        })
        .to_string())
        .unwrap()
    }

    #[test]
    fn channel_post_becomes_event() {
        let update = channel_post(-1001234, 42, "CA: abc");
        let msg = update_message(&update).unwrap();
        let event = to_event(msg);
        assert_eq!(event.channel_id, -1001234);
        assert_eq!(event.message_id, 42);
        assert_eq!(event.text, "CA: abc");
        assert_eq!(event.sender_id, None);
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
        assert!(event.raw.is_object());
    }

    #[test]
    fn recipients_by_username_or_id() {
        assert_eq!(
            recipient("@bob").unwrap(),
            Recipient::ChannelUsername("@bob".into())
        );
        assert_eq!(recipient("-100123").unwrap(), Recipient::Id(ChatId(-100123)));
        assert!(recipient("@").is_err());
        assert!(recipient("bob").is_err());
    }

    #[test]
    fn retry_after_is_a_rate_limit() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(7));
        match classify(err) {
            SolanagramError::RateLimited { wait } => assert_eq!(wait, Duration::from_secs(7)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_token_is_fatal() {
        assert!(classify(RequestError::Api(ApiError::InvalidToken)).is_fatal());
    }
}

//! Payload types for the topics exchanged between the host and its remotes.
//!
//! Every field of a topic payload is optional on the wire. Consumers fill the
//! gaps through the `*_or_default` accessors, so an emitter may send as little
//! as an empty object.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;

use crate::error::{BusError, BusResult};

/// Topic consumed by the chat application.
pub const OPEN_CHAT: &str = "open-chat";
/// Topic consumed by the email application.
pub const EMAIL_SEND: &str = "email-send";

pub const DEFAULT_CHAT_MESSAGE: &str = "Chat opened from Host";
pub const DEFAULT_EMAIL_SUBJECT: &str = "📨 New Email";
pub const DEFAULT_EMAIL_BODY: &str = "Email received from Chat";

/// One emission on the bus. The variant decides the topic.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    OpenChat(OpenChat),
    EmailSend(EmailSend),
    /// Any topic without a dedicated payload type.
    Custom {
        topic: String,
        detail: serde_json::Value,
    },
}

impl BusEvent {
    pub fn topic(&self) -> &str {
        match self {
            BusEvent::OpenChat(_) => OPEN_CHAT,
            BusEvent::EmailSend(_) => EMAIL_SEND,
            BusEvent::Custom { topic, .. } => topic,
        }
    }

    /// Builds the typed event for `topic` out of an untyped detail object.
    /// A `null` detail is read as "no fields set".
    pub fn from_json(topic: &str, detail: serde_json::Value) -> BusResult<Self> {
        let detail = if detail.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            detail
        };
        let payload_error = |source| BusError::Payload {
            topic: topic.to_string(),
            source,
        };
        match topic {
            OPEN_CHAT => serde_json::from_value(detail)
                .map(BusEvent::OpenChat)
                .map_err(payload_error),
            EMAIL_SEND => serde_json::from_value(detail)
                .map(BusEvent::EmailSend)
                .map_err(payload_error),
            _ => Ok(BusEvent::Custom {
                topic: topic.to_string(),
                detail,
            }),
        }
    }

    /// Retypes a `Custom` event whose topic has a dedicated payload type, so
    /// listeners of `open-chat` and `email-send` only ever see typed events.
    pub fn canonical(&self) -> BusResult<Cow<'_, BusEvent>> {
        match self {
            BusEvent::Custom { topic, detail } if topic == OPEN_CHAT || topic == EMAIL_SEND => {
                BusEvent::from_json(topic, detail.clone()).map(Cow::Owned)
            }
            _ => Ok(Cow::Borrowed(self)),
        }
    }

    /// The payload without its topic, as the JSON object a listener would see.
    pub fn detail(&self) -> serde_json::Value {
        match self {
            BusEvent::OpenChat(d) => serde_json::to_value(d).unwrap_or_default(),
            BusEvent::EmailSend(d) => serde_json::to_value(d).unwrap_or_default(),
            BusEvent::Custom { detail, .. } => detail.clone(),
        }
    }
}

/// `open-chat`: ask the chat application to append a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenChat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// Name of the emitting application, e.g. `email`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl OpenChat {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or(DEFAULT_CHAT_MESSAGE)
    }
}

/// `email-send`: ask the email application to deliver a new, unread email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl EmailSend {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            body: Some(body.into()),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn subject_or_default(&self) -> &str {
        self.subject.as_deref().unwrap_or(DEFAULT_EMAIL_SUBJECT)
    }

    pub fn body_or_default(&self) -> &str {
        self.body.as_deref().unwrap_or(DEFAULT_EMAIL_BODY)
    }

    /// Missing timestamps are stamped with `now`.
    pub fn timestamp_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp.unwrap_or(now)
    }
}

/// Reads an ISO-8601 timestamp. Strings without an offset are local time,
/// bare dates are midnight UTC. Anything unreadable counts as absent.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|ts| ts.with_timezone(&Utc));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let parsed = raw.as_ref().and_then(|v| v.as_str()).and_then(parse_timestamp);
    if parsed.is_none() && raw.as_ref().is_some_and(|v| !v.is_null()) {
        tracing::debug!(timestamp = ?raw, "ignoring unreadable timestamp");
    }
    Ok(parsed)
}

//! Message record model shared by the store and its adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-assigned message identifier.
pub type MessageId = i64;

/// Emotion annotation attached to a message after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Emotion {
    /// Emotion label, e.g. `joy`.
    pub name: String,
    /// Markup used to render the emotion (usually an emoji).
    pub emoji_html: String,
}

impl Emotion {
    /// Build an emotion annotation.
    pub fn new(name: impl Into<String>, emoji_html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emoji_html: emoji_html.into(),
        }
    }
}

/// Persisted chat message.
///
/// Field names on the wire are camelCase (`isError`, `emojiHtml`) so records
/// written by earlier builds stay readable. Records that still carry the old
/// `messageId` key decode into `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier supplied by the producer.
    #[serde(alias = "messageId")]
    pub id: MessageId,
    /// Message body, empty for audio-only messages.
    #[serde(default)]
    pub text: String,
    /// Provenance tag, e.g. `user` or `bot`.
    pub source: String,
    /// Raw audio payload for voice messages.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "audio_base64"
    )]
    pub audio: Option<Vec<u8>>,
    /// Emotion annotations, replaced in full by annotate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<Emotion>>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Marks a message that stands for a failure rather than content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl Message {
    /// Build a text message.
    pub fn text(
        id: MessageId,
        source: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            source: source.into(),
            audio: None,
            emotions: None,
            timestamp,
            is_error: None,
        }
    }

    /// Build a voice message with an empty body.
    pub fn audio(
        id: MessageId,
        source: impl Into<String>,
        audio: Vec<u8>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            audio: Some(audio),
            ..Self::text(id, source, String::new(), timestamp)
        }
    }

    /// Mark the message as an error placeholder.
    pub fn into_error(mut self) -> Self {
        self.is_error = Some(true);
        self
    }

    /// Whether the message is flagged as an error.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Whether the message carries text or audio.
    pub fn has_content(&self) -> bool {
        !self.text.is_empty() || self.audio.as_ref().is_some_and(|audio| !audio.is_empty())
    }
}

/// Audio travels as a base64 string inside JSON records.
mod audio_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(audio: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match audio {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Option::<String>::deserialize(deserializer)?;
        encoded
            .map(|value| STANDARD.decode(value).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::{Emotion, Message};
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn at(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let mut message = Message::text(1, "user", "hi", at("2024-01-01T00:00:00Z")).into_error();
        message.emotions = Some(vec![Emotion::new("joy", "😊")]);
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(
            value,
            json!({
                "id": 1,
                "text": "hi",
                "source": "user",
                "emotions": [{ "name": "joy", "emojiHtml": "😊" }],
                "timestamp": "2024-01-01T00:00:00Z",
                "isError": true,
            })
        );
    }

    #[test]
    fn reads_legacy_message_id_key() {
        let raw = r#"{"messageId":7,"text":"old","source":"bot","timestamp":"2023-05-01T10:00:00Z"}"#;
        let message: Message = serde_json::from_str(raw).expect("decode");
        assert_eq!(message.id, 7);
        assert_eq!(message.emotions, None);
        assert!(!message.is_error());
    }

    #[test]
    fn audio_and_sub_second_timestamps_survive_encoding() {
        let timestamp = at("2024-02-29T23:59:59.123456789Z");
        let message = Message::audio(3, "user", vec![0, 1, 2, 254, 255], timestamp);
        let encoded = serde_json::to_string(&message).expect("serialize");
        assert!(encoded.contains("\"audio\":\"AAEC/v8=\""));
        let decoded: Message = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, message);
        assert!(decoded.has_content());
    }

    #[test]
    fn empty_message_has_no_content() {
        let message = Message::text(4, "user", "", Utc::now());
        assert!(!message.has_content());
    }
}

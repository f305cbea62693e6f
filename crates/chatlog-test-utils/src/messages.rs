use chatlog_store::Message;
use chrono::{DateTime, Duration, Utc};

/// Parse an RFC 3339 timestamp.
pub fn at(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

/// Text message whose timestamp is `id` seconds after a fixed epoch.
pub fn sample_message(id: i64) -> Message {
    let timestamp = at("2024-01-01T00:00:00Z") + Duration::seconds(id);
    Message::text(id, "user", format!("message {id}"), timestamp)
}

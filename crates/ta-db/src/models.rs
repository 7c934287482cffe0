//! Database row types. These map directly to SQLite rows and are converted
//! into the `ta-types` models at the edge of the store.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use ta_types::{Group, Message, MessageType, User};
use tracing::warn;

pub struct MessageRow {
    pub id: i64,
    pub content: String,
    pub timestamp: i64,
    pub group_id: i64,
    pub kind: String,
    pub attachment_uri: Option<String>,
    pub is_edited: bool,
    pub edited_timestamp: Option<i64>,
    pub sender_id: i64,
}

pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub created_time: i64,
}

pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub avatar_color: String,
    pub created_time: i64,
    pub is_default: bool,
}

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, content, timestamp, group_id, type, attachment_uri, is_edited, edited_timestamp, sender_id";
pub(crate) const GROUP_COLUMNS: &str = "id, name, created_time";
pub(crate) const USER_COLUMNS: &str = "id, name, avatar_color, created_time, is_default";

impl MessageRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            timestamp: row.get(2)?,
            group_id: row.get(3)?,
            kind: row.get(4)?,
            attachment_uri: row.get(5)?,
            is_edited: row.get(6)?,
            edited_timestamp: row.get(7)?,
            sender_id: row.get(8)?,
        })
    }
}

impl GroupRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created_time: row.get(2)?,
        })
    }
}

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            avatar_color: row.get(2)?,
            created_time: row.get(3)?,
            is_default: row.get(4)?,
        })
    }
}

pub fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(|| {
        warn!("Timestamp out of range: {}", millis);
        DateTime::default()
    })
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        let kind = row.kind.parse().unwrap_or_else(|e| {
            warn!("Corrupt type on message {}: {}", row.id, e);
            MessageType::Text
        });

        Message {
            id: row.id,
            content: row.content,
            timestamp: from_millis(row.timestamp),
            group_id: row.group_id,
            kind,
            attachment_uri: row.attachment_uri,
            is_edited: row.is_edited,
            edited_timestamp: row.edited_timestamp.map(from_millis),
            sender_id: row.sender_id,
        }
    }
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: row.id,
            name: row.name,
            created_time: from_millis(row.created_time),
        }
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            avatar_color: row.avatar_color,
            created_time: from_millis(row.created_time),
            is_default: row.is_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_type_falls_back_to_text() {
        let row = MessageRow {
            id: 3,
            content: "x".into(),
            timestamp: 1_700_000_000_123,
            group_id: 1,
            kind: "VIDEO".into(),
            attachment_uri: None,
            is_edited: false,
            edited_timestamp: None,
            sender_id: 1,
        };

        let msg = Message::from(row);
        assert_eq!(msg.kind, MessageType::Text);
        assert_eq!(to_millis(msg.timestamp), 1_700_000_000_123);
    }
}

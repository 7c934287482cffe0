use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Id the default user is seeded with. Messages written before users
/// existed are attributed to it.
pub const DEFAULT_USER_ID: i64 = 1;

pub const DEFAULT_USER_NAME: &str = "Me";
pub const DEFAULT_GROUP_NAME: &str = "Default";
pub const DEFAULT_AVATAR_COLOR: &str = "#FF6200EE";

/// Content stored for an image message sent without a caption.
pub const IMAGE_PLACEHOLDER: &str = "Image";

/// Avatar colors offered when creating a user.
pub const AVATAR_PALETTE: [&str; 9] = [
    "#FF6200EE", "#FF03DAC5", "#FF018786",
    "#FFFF5722", "#FF4CAF50", "#FF2196F3",
    "#FFFF9800", "#FF9C27B0", "#FF795548",
];

/// Current time at the millisecond precision the store keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
            Self::File => "FILE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessageType(pub String);

impl fmt::Display for UnknownMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message type '{}'", self.0)
    }
}

impl std::error::Error for UnknownMessageType {}

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(Self::Text),
            "IMAGE" => Ok(Self::Image),
            "FILE" => Ok(Self::File),
            other => Err(UnknownMessageType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub group_id: i64,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub attachment_uri: Option<String>,
    pub is_edited: bool,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub sender_id: i64,
}

impl Message {
    /// Case-insensitive substring match on the message content.
    pub fn matches(&self, query: &str) -> bool {
        self.content.to_lowercase().contains(&query.to_lowercase())
    }
}

/// A message that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub group_id: i64,
    pub kind: MessageType,
    pub attachment_uri: Option<String>,
    pub sender_id: i64,
}

impl NewMessage {
    pub fn text(group_id: i64, sender_id: i64, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: now(),
            group_id,
            kind: MessageType::Text,
            attachment_uri: None,
            sender_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub created_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub avatar_color: String,
    pub created_time: DateTime<Utc>,
    pub is_default: bool,
}

impl User {
    /// First character of the name, shown in place of an avatar image.
    pub fn initial(&self) -> String {
        self.name.chars().take(1).collect()
    }
}

/// Local preferences. Keys missing from the stored document take their
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub use_dynamic_color: bool,
    pub custom_primary_color: u32,
    pub developer_mode: bool,
}

impl Settings {
    pub const DEFAULT_PRIMARY_COLOR: u32 = 0xFFB1_86D6;
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_dynamic_color: false,
            custom_primary_color: Self::DEFAULT_PRIMARY_COLOR,
            developer_mode: false,
        }
    }
}

/// Parses an `#AARRGGBB` or `#RRGGBB` color. Six-digit colors are opaque.
pub fn parse_argb(color: &str) -> Option<u32> {
    let hex = color.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        8 => u32::from_str_radix(hex, 16).ok(),
        6 => u32::from_str_radix(hex, 16).ok().map(|rgb| 0xFF00_0000 | rgb),
        _ => None,
    }
}

pub fn format_argb(color: u32) -> String {
    format!("#{:08X}", color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_names() {
        for kind in [MessageType::Text, MessageType::Image, MessageType::File] {
            assert_eq!(kind.as_str().parse::<MessageType>(), Ok(kind));
        }
        assert!("VIDEO".parse::<MessageType>().is_err());
        assert_eq!(serde_json::to_string(&MessageType::Image).unwrap(), "\"IMAGE\"");
    }

    #[test]
    fn test_matches_ignores_case() {
        let mut msg = Message {
            id: 1,
            content: "Buy Milk tomorrow".into(),
            timestamp: Utc::now(),
            group_id: 1,
            kind: MessageType::Text,
            attachment_uri: None,
            is_edited: false,
            edited_timestamp: None,
            sender_id: DEFAULT_USER_ID,
        };
        assert!(msg.matches("milk"));
        assert!(msg.matches("MILK TO"));
        assert!(!msg.matches("bread"));

        msg.content = String::new();
        assert!(msg.matches(""));
    }

    #[test]
    fn test_settings_defaults_fill_missing_keys() {
        let s: Settings = serde_json::from_str(r#"{"developer_mode": true}"#).unwrap();
        assert!(s.developer_mode);
        assert!(!s.use_dynamic_color);
        assert_eq!(s.custom_primary_color, 0xFFB186D6);
    }

    #[test]
    fn test_argb_parsing() {
        assert_eq!(parse_argb("#FF6200EE"), Some(0xFF6200EE));
        assert_eq!(parse_argb("#6200EE"), Some(0xFF6200EE));
        assert_eq!(parse_argb("6200EE"), None);
        assert_eq!(parse_argb("#GG0000"), None);
        assert_eq!(format_argb(0xFFB186D6), "#FFB186D6");
        for color in AVATAR_PALETTE {
            assert!(parse_argb(color).is_some());
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account in the local identity directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    /// Stored and compared in plaintext; login is an exact
    /// username+password match against the directory.
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Projection of a [`User`] returned by directory search: the fields a
/// result row needs, minus the credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar: user.avatar.clone(),
            is_verified: user.is_verified,
        }
    }
}

/// Partial profile edit. Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
    Channel,
    /// The self-only "saved messages" chat.
    Saved,
}

/// A chat thread as shown in the chat list. `last_message` is a denormalized
/// copy of the newest message so the list renders without scanning the full
/// message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub kind: ChatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    pub is_archived: bool,
    pub is_pinned: bool,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    pub unread_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub reactions: Vec<Reaction>,
    pub is_edited: bool,
    /// Present in the schema; deletion is a hard remove, so this never
    /// flips to true through the store.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One reaction slot per user per message: re-sending the same emoji
/// removes it, a different emoji replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: String,
    pub emoji: ReactionEmoji,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionEmoji {
    #[serde(rename = "❤️")]
    Heart,
    #[serde(rename = "👍")]
    ThumbsUp,
    #[serde(rename = "👎")]
    ThumbsDown,
}

impl ReactionEmoji {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heart => "❤️",
            Self::ThumbsUp => "👍",
            Self::ThumbsDown => "👎",
        }
    }
}

/// Interface theme. `crystal` is the unstyled default; every other variant
/// maps to a presentation class the shell applies globally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Crystal,
    PurpleLime,
    DarkBlue,
    WhiteBlack,
    BlueLight,
}

impl Theme {
    /// The global presentation class for this theme, or `None` for the
    /// default look.
    pub fn css_class(&self) -> Option<&'static str> {
        match self {
            Self::Crystal => None,
            Self::PurpleLime => Some("theme-purple-lime"),
            Self::DarkBlue => Some("theme-dark-blue"),
            Self::WhiteBlack => Some("theme-white-black"),
            Self::BlueLight => Some("theme-blue-light"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ru,
    En,
}

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The type used for primary keys in the database.
///
/// Every entity gets a random id assigned at creation, so ids are
/// never sequential and never reused.
pub type PrimaryKey = Uuid;

/// A loci account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    pub password: String,
    pub display_name: String,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// The location a palace is modeled after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PalaceKind {
    #[default]
    House,
    School,
    Office,
    Park,
    Mall,
    Museum,
    Library,
    Custom,
}

/// A memory palace, the top-level container owned by exactly one user
#[derive(Debug, Clone)]
pub struct PalaceData {
    pub id: PrimaryKey,
    pub owner_id: PrimaryKey,
    pub name: String,
    pub description: String,
    pub kind: PalaceKind,
    /// Relative path of the stored image, if one was uploaded
    pub image: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A room within a palace.
/// Note: `palace_id` and `order` are unique together.
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: PrimaryKey,
    pub palace_id: PrimaryKey,
    pub name: String,
    pub description: String,
    /// Display order within the palace
    pub order: i32,
    pub image: Option<String>,
    /// Position in the palace's 2D layout
    pub x_coordinate: f64,
    pub y_coordinate: f64,
}

/// What kind of fact a memory item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryItemKind {
    #[default]
    Text,
    Number,
    Name,
    Date,
    Fact,
    Task,
    Other,
}

/// A single fact to memorize, placed in a room.
/// Note: `room_id` and `position` are unique together.
#[derive(Debug, Clone)]
pub struct MemoryItemData {
    pub id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub content: String,
    pub kind: MemoryItemKind,
    /// Memory aid or association, may be empty
    pub mnemonic_hint: String,
    pub position: i32,
    pub image: Option<String>,
    pub is_mastered: bool,
    pub created_at: DateTime<Utc>,
    pub last_reviewed: DateTime<Utc>,
}

/// One timed review pass over a palace's items
#[derive(Debug, Clone)]
pub struct StudySessionData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub palace_id: PrimaryKey,
    pub started_at: DateTime<Utc>,
    /// Unset while the session is still active
    pub completed_at: Option<DateTime<Utc>>,
    pub items_reviewed: i32,
    pub items_mastered: i32,
    /// Percentage of correct recalls
    pub accuracy_score: f64,
}

/// Item totals for a palace, derived at read time
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemStats {
    pub total: i64,
    pub mastered: i64,
}

impl StudySessionData {
    /// How long the session took, once it is completed
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|c| c - self.started_at)
    }
}

impl PalaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::House => "house",
            Self::School => "school",
            Self::Office => "office",
            Self::Park => "park",
            Self::Mall => "mall",
            Self::Museum => "museum",
            Self::Library => "library",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for PalaceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "house" => Ok(Self::House),
            "school" => Ok(Self::School),
            "office" => Ok(Self::Office),
            "park" => Ok(Self::Park),
            "mall" => Ok(Self::Mall),
            "museum" => Ok(Self::Museum),
            "library" => Ok(Self::Library),
            "custom" => Ok(Self::Custom),
            other => Err(format!("{} is not a palace kind", other)),
        }
    }
}

impl MemoryItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Name => "name",
            Self::Date => "date",
            Self::Fact => "fact",
            Self::Task => "task",
            Self::Other => "other",
        }
    }
}

impl FromStr for MemoryItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "name" => Ok(Self::Name),
            "date" => Ok(Self::Date),
            "fact" => Ok(Self::Fact),
            "task" => Ok(Self::Task),
            "other" => Ok(Self::Other),
            other => Err(format!("{} is not a memory item kind", other)),
        }
    }
}

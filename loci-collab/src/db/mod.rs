use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist.
    /// Also returned when the resource exists but belongs to someone else,
    /// so existence is never disclosed to non-owners.
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    /// Turns a unique constraint violation into a conflict error
    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: String,
    ) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound { .. } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can fetch and store loci data.
///
/// Every lookup the application scopes to an owner takes the owner's id and
/// answers [DatabaseError::NotFound] when the resource is absent *or* owned
/// by someone else. For rooms and memory items the ownership check walks the
/// parent chain up to the palace owner.
#[async_trait]
pub trait Database: Send + Sync {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn palace_by_id(&self, palace_id: PrimaryKey, owner_id: PrimaryKey)
        -> Result<PalaceData>;
    /// Lists a slice of the owner's palaces, most recently created first
    async fn list_palaces(
        &self,
        owner_id: PrimaryKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PalaceData>>;
    async fn count_palaces(&self, owner_id: PrimaryKey) -> Result<i64>;
    async fn create_palace(&self, new_palace: NewPalace) -> Result<PalaceData>;
    async fn update_palace(&self, updated_palace: UpdatedPalace) -> Result<PalaceData>;
    /// Deletes a palace along with its rooms, their items, and every study
    /// session referencing the palace
    async fn delete_palace(&self, palace_id: PrimaryKey, owner_id: PrimaryKey) -> Result<()>;
    async fn set_palace_image(
        &self,
        palace_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<PalaceData>;

    async fn room_by_id(&self, room_id: PrimaryKey, owner_id: PrimaryKey) -> Result<RoomData>;
    /// Lists the rooms of a palace ordered by display order, then name
    async fn rooms_in_palace(&self, palace_id: PrimaryKey) -> Result<Vec<RoomData>>;
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn set_room_image(
        &self,
        room_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<RoomData>;

    async fn item_by_id(&self, item_id: PrimaryKey, owner_id: PrimaryKey)
        -> Result<MemoryItemData>;
    /// Lists the items of a room ordered by position, then creation time
    async fn items_in_room(&self, room_id: PrimaryKey) -> Result<Vec<MemoryItemData>>;
    /// Lists every item of a palace, room by room in room order
    async fn items_in_palace(&self, palace_id: PrimaryKey) -> Result<Vec<MemoryItemData>>;
    async fn create_item(&self, new_item: NewMemoryItem) -> Result<MemoryItemData>;
    /// Inverts the mastered flag and stamps the review time in one statement
    async fn toggle_item_mastery(
        &self,
        item_id: PrimaryKey,
        owner_id: PrimaryKey,
        reviewed_at: DateTime<Utc>,
    ) -> Result<MemoryItemData>;
    async fn set_item_image(
        &self,
        item_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<MemoryItemData>;
    /// Total and mastered item counts across all rooms of a palace
    async fn palace_item_stats(&self, palace_id: PrimaryKey) -> Result<ItemStats>;

    async fn create_study_session(
        &self,
        new_session: NewStudySession,
    ) -> Result<StudySessionData>;
    async fn study_session_by_id(
        &self,
        session_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<StudySessionData>;
    async fn complete_study_session(
        &self,
        completed: CompletedStudySession,
    ) -> Result<StudySessionData>;
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewPalace {
    /// The owner of the new palace
    pub owner_id: PrimaryKey,
    pub name: String,
    pub description: String,
    pub kind: PalaceKind,
    pub is_public: bool,
}

/// A full replacement of a palace's editable fields
#[derive(Debug)]
pub struct UpdatedPalace {
    pub id: PrimaryKey,
    pub owner_id: PrimaryKey,
    pub name: String,
    pub description: String,
    pub kind: PalaceKind,
    pub is_public: bool,
}

#[derive(Debug)]
pub struct NewRoom {
    pub palace_id: PrimaryKey,
    pub name: String,
    pub description: String,
    pub order: i32,
    pub x_coordinate: f64,
    pub y_coordinate: f64,
}

#[derive(Debug)]
pub struct NewMemoryItem {
    pub room_id: PrimaryKey,
    pub content: String,
    pub kind: MemoryItemKind,
    pub mnemonic_hint: String,
    pub position: i32,
}

#[derive(Debug)]
pub struct NewStudySession {
    pub user_id: PrimaryKey,
    pub palace_id: PrimaryKey,
}

#[derive(Debug)]
pub struct CompletedStudySession {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub completed_at: DateTime<Utc>,
    pub items_reviewed: i32,
    pub items_mastered: i32,
    pub accuracy_score: f64,
}

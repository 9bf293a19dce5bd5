//! All schemas that are exposed from endpoints are defined here
//! along with the [ToSerialized] impls

use chrono::{DateTime, Utc};
use loci_collab::{
    MemoryItemData, PalaceData, PalaceDetail as CollabPalaceDetail, Page, RoomData,
    RoomDetail as CollabRoomDetail, SessionData, StudySessionData,
    StudySessionView as CollabStudySessionView, UserData,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: Uuid,
    username: String,
    display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Palace {
    id: Uuid,
    name: String,
    description: String,
    kind: String,
    image: Option<String>,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PalacePage {
    palaces: Vec<Palace>,
    page: i64,
    total_items: i64,
    total_pages: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PalaceDetail {
    palace: Palace,
    rooms: Vec<Room>,
    total_items: i64,
    mastered_items: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    id: Uuid,
    palace_id: Uuid,
    name: String,
    description: String,
    order: i32,
    image: Option<String>,
    x_coordinate: f64,
    y_coordinate: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomDetail {
    palace: Palace,
    room: Room,
    items: Vec<MemoryItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemoryItem {
    id: Uuid,
    room_id: Uuid,
    content: String,
    kind: String,
    mnemonic_hint: String,
    position: i32,
    image: Option<String>,
    is_mastered: bool,
    created_at: DateTime<Utc>,
    last_reviewed: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudySession {
    id: Uuid,
    palace_id: Uuid,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    items_reviewed: i32,
    items_mastered: i32,
    accuracy_score: f64,
    /// Derived from the timestamps, absent while the session is active
    duration_seconds: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudySessionView {
    pub session: StudySession,
    pub palace: Palace,
    pub rooms: Vec<Room>,
    pub items: Vec<MemoryItem>,
}

/// The structured payload of the mastery toggle endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleMasteryResult {
    pub success: bool,
    pub is_mastered: bool,
}

/// A mutation result carrying the user-visible success notice
#[derive(Debug, Serialize, ToSchema)]
pub struct PalaceResult {
    pub message: String,
    pub palace: Palace,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResult {
    pub message: String,
    pub room: Room,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MemoryItemResult {
    pub message: String,
    pub item: MemoryItem,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompletionResult {
    pub message: String,
    pub session: StudySession,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletionResult {
    pub message: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Palace> for PalaceData {
    fn to_serialized(&self) -> Palace {
        Palace {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind.as_str().to_string(),
            image: self.image.clone(),
            is_public: self.is_public,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ToSerialized<PalacePage> for Page<PalaceData> {
    fn to_serialized(&self) -> PalacePage {
        PalacePage {
            palaces: self.items.to_serialized(),
            page: self.page,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

impl ToSerialized<PalaceDetail> for CollabPalaceDetail {
    fn to_serialized(&self) -> PalaceDetail {
        PalaceDetail {
            palace: self.palace.to_serialized(),
            rooms: self.rooms.to_serialized(),
            total_items: self.total_items,
            mastered_items: self.mastered_items,
        }
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            palace_id: self.palace_id,
            name: self.name.clone(),
            description: self.description.clone(),
            order: self.order,
            image: self.image.clone(),
            x_coordinate: self.x_coordinate,
            y_coordinate: self.y_coordinate,
        }
    }
}

impl ToSerialized<RoomDetail> for CollabRoomDetail {
    fn to_serialized(&self) -> RoomDetail {
        RoomDetail {
            palace: self.palace.to_serialized(),
            room: self.room.to_serialized(),
            items: self.items.to_serialized(),
        }
    }
}

impl ToSerialized<MemoryItem> for MemoryItemData {
    fn to_serialized(&self) -> MemoryItem {
        MemoryItem {
            id: self.id,
            room_id: self.room_id,
            content: self.content.clone(),
            kind: self.kind.as_str().to_string(),
            mnemonic_hint: self.mnemonic_hint.clone(),
            position: self.position,
            image: self.image.clone(),
            is_mastered: self.is_mastered,
            created_at: self.created_at,
            last_reviewed: self.last_reviewed,
        }
    }
}

impl ToSerialized<StudySession> for StudySessionData {
    fn to_serialized(&self) -> StudySession {
        StudySession {
            id: self.id,
            palace_id: self.palace_id,
            started_at: self.started_at,
            completed_at: self.completed_at,
            items_reviewed: self.items_reviewed,
            items_mastered: self.items_mastered,
            accuracy_score: self.accuracy_score,
            duration_seconds: self.duration().map(|d| d.num_seconds()),
        }
    }
}

impl ToSerialized<StudySessionView> for CollabStudySessionView {
    fn to_serialized(&self) -> StudySessionView {
        StudySessionView {
            session: self.session.to_serialized(),
            palace: self.palace.to_serialized(),
            rooms: self.rooms.to_serialized(),
            items: self.items.to_serialized(),
        }
    }
}

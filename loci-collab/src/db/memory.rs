use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    CompletedStudySession, Database, DatabaseError, DatabaseResult, ItemStats, MemoryItemData,
    NewMemoryItem, NewPalace, NewRoom, NewSession, NewStudySession, NewUser, PalaceData,
    PrimaryKey, Result, RoomData, SessionData, StudySessionData, UpdatedPalace, UserData,
};

/// An in-memory database implementation backed by plain vectors.
///
/// Used by unit tests and local experimentation. Mirrors the ordering,
/// uniqueness, ownership scoping, and cascade rules of [super::PgDatabase].
#[derive(Default)]
pub struct MemoryDatabase {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    /// Monotonic insertion counter, used to break timestamp ties
    seq: u64,
    users: Vec<UserData>,
    sessions: Vec<StoredSession>,
    palaces: Vec<(u64, PalaceData)>,
    rooms: Vec<RoomData>,
    items: Vec<MemoryItemData>,
    study_sessions: Vec<StudySessionData>,
}

struct StoredSession {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(resource: &'static str, identifier: &'static str) -> DatabaseError {
    DatabaseError::NotFound {
        resource,
        identifier,
    }
}

impl State {
    fn palace_of_owner(&self, palace_id: PrimaryKey, owner_id: PrimaryKey) -> Option<&PalaceData> {
        self.palaces
            .iter()
            .map(|(_, p)| p)
            .find(|p| p.id == palace_id && p.owner_id == owner_id)
    }

    /// Walks the item -> room -> palace chain and answers the item only when
    /// the palace belongs to the given owner
    fn item_of_owner(&self, item_id: PrimaryKey, owner_id: PrimaryKey) -> Option<usize> {
        let index = self.items.iter().position(|i| i.id == item_id)?;
        let room_id = self.items[index].room_id;
        let room = self.rooms.iter().find(|r| r.id == room_id)?;
        self.palace_of_owner(room.palace_id, owner_id)?;

        Some(index)
    }

    fn room_of_owner(&self, room_id: PrimaryKey, owner_id: PrimaryKey) -> Option<&RoomData> {
        let room = self.rooms.iter().find(|r| r.id == room_id)?;
        self.palace_of_owner(room.palace_id, owner_id)?;

        Some(room)
    }

    fn ordered_rooms(&self, palace_id: PrimaryKey) -> Vec<RoomData> {
        let mut rooms: Vec<_> = self
            .rooms
            .iter()
            .filter(|r| r.palace_id == palace_id)
            .cloned()
            .collect();

        rooms.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        rooms
    }

    fn ordered_items(&self, room_id: PrimaryKey) -> Vec<MemoryItemData> {
        let mut items: Vec<_> = self
            .items
            .iter()
            .filter(|i| i.room_id == room_id)
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        items
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state
            .read()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| not_found("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .read()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| not_found("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        let user = UserData {
            id: Uuid::new_v4(),
            username: new_user.username,
            password: new_user.password,
            display_name: new_user.display_name,
        };

        self.state.write().users.push(user.clone());
        Ok(user)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let state = self.state.read();
        let session = state
            .sessions
            .iter()
            .find(|s| s.token == token)
            .ok_or_else(|| not_found("session", "token"))?;

        let user = state
            .users
            .iter()
            .find(|u| u.id == session.user_id)
            .cloned()
            .ok_or_else(|| not_found("user", "id"))?;

        Ok(SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        self.state.write().sessions.push(StoredSession {
            id: Uuid::new_v4(),
            token: new_session.token.clone(),
            user_id: new_session.user_id,
            expires_at: new_session.expires_at,
        });

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.write();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.token != token);

        if state.sessions.len() == before {
            return Err(not_found("session", "token"));
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.write().sessions.retain(|s| s.expires_at > now);
        Ok(())
    }

    async fn palace_by_id(
        &self,
        palace_id: PrimaryKey,
        owner_id: PrimaryKey,
    ) -> Result<PalaceData> {
        self.state
            .read()
            .palace_of_owner(palace_id, owner_id)
            .cloned()
            .ok_or_else(|| not_found("palace", "id"))
    }

    async fn list_palaces(
        &self,
        owner_id: PrimaryKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PalaceData>> {
        let state = self.state.read();
        let mut palaces: Vec<_> = state
            .palaces
            .iter()
            .filter(|(_, p)| p.owner_id == owner_id)
            .collect();

        // Most recently created first
        palaces.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| seq_b.cmp(seq_a))
        });

        Ok(palaces
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn count_palaces(&self, owner_id: PrimaryKey) -> Result<i64> {
        let count = self
            .state
            .read()
            .palaces
            .iter()
            .filter(|(_, p)| p.owner_id == owner_id)
            .count();

        Ok(count as i64)
    }

    async fn create_palace(&self, new_palace: NewPalace) -> Result<PalaceData> {
        let now = Utc::now();
        let palace = PalaceData {
            id: Uuid::new_v4(),
            owner_id: new_palace.owner_id,
            name: new_palace.name,
            description: new_palace.description,
            kind: new_palace.kind,
            image: None,
            is_public: new_palace.is_public,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write();
        state.seq += 1;
        let seq = state.seq;
        state.palaces.push((seq, palace.clone()));

        Ok(palace)
    }

    async fn update_palace(&self, updated_palace: UpdatedPalace) -> Result<PalaceData> {
        let mut state = self.state.write();
        let palace = state
            .palaces
            .iter_mut()
            .map(|(_, p)| p)
            .find(|p| p.id == updated_palace.id && p.owner_id == updated_palace.owner_id)
            .ok_or_else(|| not_found("palace", "id"))?;

        palace.name = updated_palace.name;
        palace.description = updated_palace.description;
        palace.kind = updated_palace.kind;
        palace.is_public = updated_palace.is_public;
        palace.updated_at = Utc::now();

        Ok(palace.clone())
    }

    async fn delete_palace(&self, palace_id: PrimaryKey, owner_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.write();

        state
            .palace_of_owner(palace_id, owner_id)
            .ok_or_else(|| not_found("palace", "id"))?;

        // Explicit cascade, parent first
        state.palaces.retain(|(_, p)| p.id != palace_id);

        let removed_rooms: Vec<_> = state
            .rooms
            .iter()
            .filter(|r| r.palace_id == palace_id)
            .map(|r| r.id)
            .collect();

        state.rooms.retain(|r| r.palace_id != palace_id);
        state.items.retain(|i| !removed_rooms.contains(&i.room_id));
        state.study_sessions.retain(|s| s.palace_id != palace_id);

        Ok(())
    }

    async fn set_palace_image(
        &self,
        palace_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<PalaceData> {
        let mut state = self.state.write();
        let palace = state
            .palaces
            .iter_mut()
            .map(|(_, p)| p)
            .find(|p| p.id == palace_id && p.owner_id == owner_id)
            .ok_or_else(|| not_found("palace", "id"))?;

        palace.image = Some(image.to_string());
        palace.updated_at = Utc::now();

        Ok(palace.clone())
    }

    async fn room_by_id(&self, room_id: PrimaryKey, owner_id: PrimaryKey) -> Result<RoomData> {
        self.state
            .read()
            .room_of_owner(room_id, owner_id)
            .cloned()
            .ok_or_else(|| not_found("room", "id"))
    }

    async fn rooms_in_palace(&self, palace_id: PrimaryKey) -> Result<Vec<RoomData>> {
        Ok(self.state.read().ordered_rooms(palace_id))
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let mut state = self.state.write();

        let taken = state
            .rooms
            .iter()
            .any(|r| r.palace_id == new_room.palace_id && r.order == new_room.order);

        if taken {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "order",
                value: new_room.order.to_string(),
            });
        }

        let room = RoomData {
            id: Uuid::new_v4(),
            palace_id: new_room.palace_id,
            name: new_room.name,
            description: new_room.description,
            order: new_room.order,
            image: None,
            x_coordinate: new_room.x_coordinate,
            y_coordinate: new_room.y_coordinate,
        };

        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn set_room_image(
        &self,
        room_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<RoomData> {
        let mut state = self.state.write();

        state
            .room_of_owner(room_id, owner_id)
            .ok_or_else(|| not_found("room", "id"))?;

        let room = state
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or_else(|| not_found("room", "id"))?;

        room.image = Some(image.to_string());
        Ok(room.clone())
    }

    async fn item_by_id(
        &self,
        item_id: PrimaryKey,
        owner_id: PrimaryKey,
    ) -> Result<MemoryItemData> {
        let state = self.state.read();
        let index = state
            .item_of_owner(item_id, owner_id)
            .ok_or_else(|| not_found("memory item", "id"))?;

        Ok(state.items[index].clone())
    }

    async fn items_in_room(&self, room_id: PrimaryKey) -> Result<Vec<MemoryItemData>> {
        Ok(self.state.read().ordered_items(room_id))
    }

    async fn items_in_palace(&self, palace_id: PrimaryKey) -> Result<Vec<MemoryItemData>> {
        let state = self.state.read();
        let mut items = Vec::new();

        for room in state.ordered_rooms(palace_id) {
            items.extend(state.ordered_items(room.id));
        }

        Ok(items)
    }

    async fn create_item(&self, new_item: NewMemoryItem) -> Result<MemoryItemData> {
        let mut state = self.state.write();

        let taken = state
            .items
            .iter()
            .any(|i| i.room_id == new_item.room_id && i.position == new_item.position);

        if taken {
            return Err(DatabaseError::Conflict {
                resource: "memory item",
                field: "position",
                value: new_item.position.to_string(),
            });
        }

        let now = Utc::now();
        let item = MemoryItemData {
            id: Uuid::new_v4(),
            room_id: new_item.room_id,
            content: new_item.content,
            kind: new_item.kind,
            mnemonic_hint: new_item.mnemonic_hint,
            position: new_item.position,
            image: None,
            is_mastered: false,
            created_at: now,
            last_reviewed: now,
        };

        state.items.push(item.clone());
        Ok(item)
    }

    async fn toggle_item_mastery(
        &self,
        item_id: PrimaryKey,
        owner_id: PrimaryKey,
        reviewed_at: DateTime<Utc>,
    ) -> Result<MemoryItemData> {
        let mut state = self.state.write();
        let index = state
            .item_of_owner(item_id, owner_id)
            .ok_or_else(|| not_found("memory item", "id"))?;

        let item = &mut state.items[index];
        item.is_mastered = !item.is_mastered;
        item.last_reviewed = reviewed_at;

        Ok(item.clone())
    }

    async fn set_item_image(
        &self,
        item_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<MemoryItemData> {
        let mut state = self.state.write();
        let index = state
            .item_of_owner(item_id, owner_id)
            .ok_or_else(|| not_found("memory item", "id"))?;

        state.items[index].image = Some(image.to_string());
        Ok(state.items[index].clone())
    }

    async fn palace_item_stats(&self, palace_id: PrimaryKey) -> Result<ItemStats> {
        let state = self.state.read();
        let mut stats = ItemStats::default();

        for room in state.rooms.iter().filter(|r| r.palace_id == palace_id) {
            for item in state.items.iter().filter(|i| i.room_id == room.id) {
                stats.total += 1;

                if item.is_mastered {
                    stats.mastered += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn create_study_session(
        &self,
        new_session: NewStudySession,
    ) -> Result<StudySessionData> {
        let session = StudySessionData {
            id: Uuid::new_v4(),
            user_id: new_session.user_id,
            palace_id: new_session.palace_id,
            started_at: Utc::now(),
            completed_at: None,
            items_reviewed: 0,
            items_mastered: 0,
            accuracy_score: 0.,
        };

        self.state.write().study_sessions.push(session.clone());
        Ok(session)
    }

    async fn study_session_by_id(
        &self,
        session_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<StudySessionData> {
        self.state
            .read()
            .study_sessions
            .iter()
            .find(|s| s.id == session_id && s.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("study session", "id"))
    }

    async fn complete_study_session(
        &self,
        completed: CompletedStudySession,
    ) -> Result<StudySessionData> {
        let mut state = self.state.write();
        let session = state
            .study_sessions
            .iter_mut()
            .find(|s| s.id == completed.id && s.user_id == completed.user_id)
            .ok_or_else(|| not_found("study session", "id"))?;

        session.completed_at = Some(completed.completed_at);
        session.items_reviewed = completed.items_reviewed;
        session.items_mastered = completed.items_mastered;
        session.accuracy_score = completed.accuracy_score;

        Ok(session.clone())
    }
}

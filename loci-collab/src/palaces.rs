use chrono::Utc;
use thiserror::Error;

use crate::{
    images, CollabContext, Database, DatabaseError, ImageError, MemoryItemData, NewMemoryItem,
    NewPalace, NewRoom, PalaceData, PrimaryKey, RoomData, UpdatedPalace,
};

/// Manages palaces and everything inside them, scoped to their owners.
///
/// Rooms and memory items have no owner column of their own, so every
/// operation on them resolves ownership by walking the parent chain up to
/// the palace. That traversal lives in the [Database] lookups, which answer
/// NotFound for resources the acting user doesn't own.
pub struct PalaceManager<Db> {
    context: CollabContext<Db>,
}

#[derive(Debug, Error)]
pub enum PalaceError {
    #[error(transparent)]
    Db(#[from] DatabaseError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// A slice of an owner's palaces
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

/// A palace along with everything derived at read time
#[derive(Debug)]
pub struct PalaceDetail {
    pub palace: PalaceData,
    pub rooms: Vec<RoomData>,
    pub total_items: i64,
    pub mastered_items: i64,
}

/// A room presented with its resolved parent and items
#[derive(Debug)]
pub struct RoomDetail {
    pub palace: PalaceData,
    pub room: RoomData,
    pub items: Vec<MemoryItemData>,
}

impl<Db> PalaceManager<Db>
where
    Db: Database,
{
    pub const PAGE_SIZE: i64 = 12;

    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Lists one page of the owner's palaces, most recently created first
    pub async fn list(
        &self,
        owner_id: PrimaryKey,
        page: i64,
    ) -> Result<Page<PalaceData>, DatabaseError> {
        let page = page.max(1);
        let offset = (page - 1) * Self::PAGE_SIZE;

        let total_items = self.context.database.count_palaces(owner_id).await?;
        let items = self
            .context
            .database
            .list_palaces(owner_id, Self::PAGE_SIZE, offset)
            .await?;

        Ok(Page {
            items,
            page,
            total_items,
            total_pages: (total_items + Self::PAGE_SIZE - 1) / Self::PAGE_SIZE,
        })
    }

    pub async fn create(&self, new_palace: NewPalace) -> Result<PalaceData, DatabaseError> {
        self.context.database.create_palace(new_palace).await
    }

    /// Returns one owned palace with its rooms and item totals
    pub async fn detail(
        &self,
        owner_id: PrimaryKey,
        palace_id: PrimaryKey,
    ) -> Result<PalaceDetail, DatabaseError> {
        let palace = self.context.database.palace_by_id(palace_id, owner_id).await?;
        let rooms = self.context.database.rooms_in_palace(palace_id).await?;
        let stats = self.context.database.palace_item_stats(palace_id).await?;

        Ok(PalaceDetail {
            palace,
            rooms,
            total_items: stats.total,
            mastered_items: stats.mastered,
        })
    }

    pub async fn update(&self, updated_palace: UpdatedPalace) -> Result<PalaceData, DatabaseError> {
        self.context.database.update_palace(updated_palace).await
    }

    /// Deletes a palace together with its rooms, their items, and any study
    /// sessions referencing it
    pub async fn delete(
        &self,
        owner_id: PrimaryKey,
        palace_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.context.database.delete_palace(palace_id, owner_id).await
    }

    /// Creates a room under a palace the user owns. The parent linkage in
    /// `new_room` is expected to come from the resolved path, never from
    /// client input.
    pub async fn create_room(
        &self,
        owner_id: PrimaryKey,
        new_room: NewRoom,
    ) -> Result<RoomData, DatabaseError> {
        // Resolve and authorize the parent before touching the child
        self.context
            .database
            .palace_by_id(new_room.palace_id, owner_id)
            .await?;

        self.context.database.create_room(new_room).await
    }

    /// Returns one room of an owned palace together with its items
    pub async fn room_detail(
        &self,
        owner_id: PrimaryKey,
        palace_id: PrimaryKey,
        room_id: PrimaryKey,
    ) -> Result<RoomDetail, DatabaseError> {
        let palace = self.context.database.palace_by_id(palace_id, owner_id).await?;
        let room = self.context.database.room_by_id(room_id, owner_id).await?;

        if room.palace_id != palace.id {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        let items = self.context.database.items_in_room(room.id).await?;

        Ok(RoomDetail {
            palace,
            room,
            items,
        })
    }

    /// Creates a memory item under a room of an owned palace
    pub async fn create_item(
        &self,
        owner_id: PrimaryKey,
        palace_id: PrimaryKey,
        new_item: NewMemoryItem,
    ) -> Result<MemoryItemData, DatabaseError> {
        self.context.database.palace_by_id(palace_id, owner_id).await?;
        let room = self
            .context
            .database
            .room_by_id(new_item.room_id, owner_id)
            .await?;

        if room.palace_id != palace_id {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        self.context.database.create_item(new_item).await
    }

    /// Inverts an item's mastered flag and stamps its review time
    pub async fn toggle_mastery(
        &self,
        owner_id: PrimaryKey,
        item_id: PrimaryKey,
    ) -> Result<MemoryItemData, DatabaseError> {
        self.context
            .database
            .toggle_item_mastery(item_id, owner_id, Utc::now())
            .await
    }

    /// Stores an uploaded palace image and records it, downscaled to bounds
    pub async fn attach_palace_image(
        &self,
        owner_id: PrimaryKey,
        palace_id: PrimaryKey,
        bytes: &[u8],
    ) -> Result<PalaceData, PalaceError> {
        self.context
            .database
            .palace_by_id(palace_id, owner_id)
            .await?;

        let path = images::store_constrained(&self.context.config.media_dir, "palace_images", bytes)?;

        let palace = self
            .context
            .database
            .set_palace_image(palace_id, owner_id, &path)
            .await?;

        Ok(palace)
    }

    /// Stores an uploaded room image and records it, downscaled to bounds
    pub async fn attach_room_image(
        &self,
        owner_id: PrimaryKey,
        room_id: PrimaryKey,
        bytes: &[u8],
    ) -> Result<RoomData, PalaceError> {
        self.context.database.room_by_id(room_id, owner_id).await?;

        let path = images::store_constrained(&self.context.config.media_dir, "room_images", bytes)?;

        let room = self
            .context
            .database
            .set_room_image(room_id, owner_id, &path)
            .await?;

        Ok(room)
    }

    /// Stores an uploaded item image and records it, downscaled to bounds
    pub async fn attach_item_image(
        &self,
        owner_id: PrimaryKey,
        item_id: PrimaryKey,
        bytes: &[u8],
    ) -> Result<MemoryItemData, PalaceError> {
        self.context.database.item_by_id(item_id, owner_id).await?;

        let path = images::store_constrained(&self.context.config.media_dir, "memory_items", bytes)?;

        let item = self
            .context
            .database
            .set_item_image(item_id, owner_id, &path)
            .await?;

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Collab, CollabConfig, MemoryDatabase, MemoryItemKind, NewStudySession, NewUser, PalaceKind,
        UserData,
    };

    async fn collab() -> (Collab<MemoryDatabase>, UserData) {
        let collab = Collab::new(
            MemoryDatabase::new(),
            CollabConfig {
                media_dir: std::env::temp_dir(),
            },
        );

        let user = collab
            .database()
            .create_user(NewUser {
                username: crate::util::random_string(12),
                password: "hash".to_string(),
                display_name: "Test user".to_string(),
            })
            .await
            .expect("creates user");

        (collab, user)
    }

    fn new_palace(owner_id: PrimaryKey, name: &str) -> NewPalace {
        NewPalace {
            owner_id,
            name: name.to_string(),
            description: String::new(),
            kind: PalaceKind::House,
            is_public: false,
        }
    }

    fn new_room(palace_id: PrimaryKey, name: &str, order: i32) -> NewRoom {
        NewRoom {
            palace_id,
            name: name.to_string(),
            description: String::new(),
            order,
            x_coordinate: 0.,
            y_coordinate: 0.,
        }
    }

    fn new_item(room_id: PrimaryKey, content: &str, position: i32) -> NewMemoryItem {
        NewMemoryItem {
            room_id,
            content: content.to_string(),
            kind: MemoryItemKind::Text,
            mnemonic_hint: String::new(),
            position,
        }
    }

    #[tokio::test]
    async fn palaces_of_other_users_read_as_not_found() {
        let (collab, owner) = collab().await;

        let other = collab
            .database()
            .create_user(NewUser {
                username: "intruder".to_string(),
                password: "hash".to_string(),
                display_name: "Someone else".to_string(),
            })
            .await
            .expect("creates user");

        let palace = collab
            .palaces
            .create(new_palace(owner.id, "Childhood home"))
            .await
            .expect("creates palace");

        let detail = collab.palaces.detail(other.id, palace.id).await;
        assert!(matches!(detail, Err(DatabaseError::NotFound { .. })));

        let update = collab
            .palaces
            .update(UpdatedPalace {
                id: palace.id,
                owner_id: other.id,
                name: "Taken over".to_string(),
                description: String::new(),
                kind: PalaceKind::House,
                is_public: false,
            })
            .await;
        assert!(matches!(update, Err(DatabaseError::NotFound { .. })));

        let delete = collab.palaces.delete(other.id, palace.id).await;
        assert!(matches!(delete, Err(DatabaseError::NotFound { .. })));

        // The owner still sees it untouched
        let detail = collab
            .palaces
            .detail(owner.id, palace.id)
            .await
            .expect("owner reads");
        assert_eq!(detail.palace.name, "Childhood home");
    }

    #[tokio::test]
    async fn duplicate_room_order_fails_and_persists_nothing() {
        let (collab, owner) = collab().await;
        let palace = collab
            .palaces
            .create(new_palace(owner.id, "School"))
            .await
            .expect("creates palace");

        collab
            .palaces
            .create_room(owner.id, new_room(palace.id, "Hallway", 1))
            .await
            .expect("creates room");

        let duplicate = collab
            .palaces
            .create_room(owner.id, new_room(palace.id, "Library", 1))
            .await;

        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));

        let detail = collab.palaces.detail(owner.id, palace.id).await.expect("reads");
        assert_eq!(detail.rooms.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_item_position_fails_and_persists_nothing() {
        let (collab, owner) = collab().await;
        let palace = collab
            .palaces
            .create(new_palace(owner.id, "Office"))
            .await
            .expect("creates palace");
        let room = collab
            .palaces
            .create_room(owner.id, new_room(palace.id, "Lobby", 0))
            .await
            .expect("creates room");

        collab
            .palaces
            .create_item(owner.id, palace.id, new_item(room.id, "First fact", 1))
            .await
            .expect("creates item");

        let duplicate = collab
            .palaces
            .create_item(owner.id, palace.id, new_item(room.id, "Second fact", 1))
            .await;

        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));

        let detail = collab
            .palaces
            .room_detail(owner.id, palace.id, room.id)
            .await
            .expect("reads");
        assert_eq!(detail.items.len(), 1);
    }

    #[tokio::test]
    async fn toggling_twice_restores_the_flag_and_stamps_reviews() {
        let (collab, owner) = collab().await;
        let palace = collab
            .palaces
            .create(new_palace(owner.id, "Park"))
            .await
            .expect("creates palace");
        let room = collab
            .palaces
            .create_room(owner.id, new_room(palace.id, "Fountain", 0))
            .await
            .expect("creates room");
        let item = collab
            .palaces
            .create_item(owner.id, palace.id, new_item(room.id, "A fact", 1))
            .await
            .expect("creates item");

        assert!(!item.is_mastered);

        let once = collab
            .palaces
            .toggle_mastery(owner.id, item.id)
            .await
            .expect("toggles");
        assert!(once.is_mastered);
        assert!(once.last_reviewed >= item.last_reviewed);

        let twice = collab
            .palaces
            .toggle_mastery(owner.id, item.id)
            .await
            .expect("toggles");
        assert!(!twice.is_mastered);
        assert!(twice.last_reviewed >= once.last_reviewed);
    }

    #[tokio::test]
    async fn deleting_a_palace_cascades_to_everything_inside() {
        let (collab, owner) = collab().await;
        let palace = collab
            .palaces
            .create(new_palace(owner.id, "Museum"))
            .await
            .expect("creates palace");
        let room = collab
            .palaces
            .create_room(owner.id, new_room(palace.id, "Atrium", 0))
            .await
            .expect("creates room");
        let item = collab
            .palaces
            .create_item(owner.id, palace.id, new_item(room.id, "A fact", 1))
            .await
            .expect("creates item");
        let session = collab
            .database()
            .create_study_session(NewStudySession {
                user_id: owner.id,
                palace_id: palace.id,
            })
            .await
            .expect("creates session");

        collab.palaces.delete(owner.id, palace.id).await.expect("deletes");

        let db = collab.database();
        assert!(db.palace_by_id(palace.id, owner.id).await.is_err());
        assert!(db.room_by_id(room.id, owner.id).await.is_err());
        assert!(db.item_by_id(item.id, owner.id).await.is_err());
        assert!(db.study_session_by_id(session.id, owner.id).await.is_err());
    }

    #[tokio::test]
    async fn listing_paginates_twelve_per_page_newest_first() {
        let (collab, owner) = collab().await;

        for n in 1..=15 {
            collab
                .palaces
                .create(new_palace(owner.id, &format!("Palace {}", n)))
                .await
                .expect("creates palace");
        }

        let first = collab.palaces.list(owner.id, 1).await.expect("lists");
        assert_eq!(first.items.len(), 12);
        assert_eq!(first.total_items, 15);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.items[0].name, "Palace 15");

        let second = collab.palaces.list(owner.id, 2).await.expect("lists");
        assert_eq!(second.items.len(), 3);
        assert_eq!(second.items[2].name, "Palace 1");
    }

    #[tokio::test]
    async fn detail_counts_items_across_rooms() {
        let (collab, owner) = collab().await;
        let palace = collab
            .palaces
            .create(new_palace(owner.id, "Library"))
            .await
            .expect("creates palace");

        let first = collab
            .palaces
            .create_room(owner.id, new_room(palace.id, "Reading room", 0))
            .await
            .expect("creates room");
        let second = collab
            .palaces
            .create_room(owner.id, new_room(palace.id, "Archive", 1))
            .await
            .expect("creates room");

        for position in 1..=2 {
            collab
                .palaces
                .create_item(owner.id, palace.id, new_item(first.id, "fact", position))
                .await
                .expect("creates item");
        }
        let mastered = collab
            .palaces
            .create_item(owner.id, palace.id, new_item(second.id, "fact", 1))
            .await
            .expect("creates item");
        collab
            .palaces
            .toggle_mastery(owner.id, mastered.id)
            .await
            .expect("toggles");

        let detail = collab.palaces.detail(owner.id, palace.id).await.expect("reads");
        assert_eq!(detail.total_items, 3);
        assert_eq!(detail.mastered_items, 1);
    }

    #[tokio::test]
    async fn rooms_from_another_palace_do_not_resolve() {
        let (collab, owner) = collab().await;
        let first = collab
            .palaces
            .create(new_palace(owner.id, "First"))
            .await
            .expect("creates palace");
        let second = collab
            .palaces
            .create(new_palace(owner.id, "Second"))
            .await
            .expect("creates palace");
        let room = collab
            .palaces
            .create_room(owner.id, new_room(first.id, "Hall", 0))
            .await
            .expect("creates room");

        // The room exists, but not under the palace named in the path
        let detail = collab.palaces.room_detail(owner.id, second.id, room.id).await;
        assert!(matches!(detail, Err(DatabaseError::NotFound { .. })));
    }
}

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Error as SqlxError, FromRow, PgPool};
use uuid::Uuid;

use crate::{
    CompletedStudySession, Database, DatabaseError, DatabaseResult, IntoDatabaseError, ItemStats,
    MemoryItemData, MemoryItemKind, NewMemoryItem, NewPalace, NewRoom, NewSession,
    NewStudySession, NewUser, PalaceData, PalaceKind, PrimaryKey, Result, RoomData, SessionData,
    StudySessionData, UpdatedPalace, UserData,
};

/// A postgres database implementation for loci
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        log::info!("Connected to database and applied pending migrations");

        Ok(Self { pool })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password: String,
    display_name: String,
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    user_id: Uuid,
    username: String,
    password: String,
    display_name: String,
}

#[derive(FromRow)]
struct PalaceRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: String,
    kind: String,
    image: Option<String>,
    is_public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct RoomRow {
    id: Uuid,
    palace_id: Uuid,
    name: String,
    description: String,
    display_order: i32,
    image: Option<String>,
    x_coordinate: f64,
    y_coordinate: f64,
}

#[derive(FromRow)]
struct MemoryItemRow {
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

#[derive(FromRow)]
struct StudySessionRow {
    id: Uuid,
    user_id: Uuid,
    palace_id: Uuid,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    items_reviewed: i32,
    items_mastered: i32,
    accuracy_score: f64,
}

#[derive(FromRow)]
struct ItemStatsRow {
    total: i64,
    mastered: i64,
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            password: row.password,
            display_name: row.display_name,
        }
    }
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                username: row.username,
                password: row.password,
                display_name: row.display_name,
            },
        }
    }
}

impl PalaceRow {
    fn into_data(self) -> Result<PalaceData> {
        Ok(PalaceData {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            kind: PalaceKind::from_str(&self.kind).map_err(|e| DatabaseError::Internal(e.into()))?,
            image: self.image,
            is_public: self.is_public,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<RoomRow> for RoomData {
    fn from(row: RoomRow) -> Self {
        Self {
            id: row.id,
            palace_id: row.palace_id,
            name: row.name,
            description: row.description,
            order: row.display_order,
            image: row.image,
            x_coordinate: row.x_coordinate,
            y_coordinate: row.y_coordinate,
        }
    }
}

impl MemoryItemRow {
    fn into_data(self) -> Result<MemoryItemData> {
        Ok(MemoryItemData {
            id: self.id,
            room_id: self.room_id,
            content: self.content,
            kind: MemoryItemKind::from_str(&self.kind)
                .map_err(|e| DatabaseError::Internal(e.into()))?,
            mnemonic_hint: self.mnemonic_hint,
            position: self.position,
            image: self.image,
            is_mastered: self.is_mastered,
            created_at: self.created_at,
            last_reviewed: self.last_reviewed,
        })
    }
}

impl From<StudySessionRow> for StudySessionData {
    fn from(row: StudySessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            palace_id: row.palace_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
            items_reviewed: row.items_reviewed,
            items_mastered: row.items_mastered,
            accuracy_score: row.accuracy_score,
        }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, username, password, display_name)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(&new_user.display_name)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.conflict_or_any("user", "username", new_user.username))
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        sqlx::query_as::<_, SessionRow>(
            "SELECT
                sessions.*,
                users.username,
                users.password,
                users.display_name
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("session", "token"))
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        sqlx::query("INSERT INTO sessions (id, token, user_id, expires_at) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(&new_session.token)
            .bind(new_session.user_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE timezone('UTC', now()) > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn palace_by_id(
        &self,
        palace_id: PrimaryKey,
        owner_id: PrimaryKey,
    ) -> Result<PalaceData> {
        sqlx::query_as::<_, PalaceRow>("SELECT * FROM palaces WHERE id = $1 AND owner_id = $2")
            .bind(palace_id)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("palace", "id"))?
            .into_data()
    }

    async fn list_palaces(
        &self,
        owner_id: PrimaryKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PalaceData>> {
        sqlx::query_as::<_, PalaceRow>(
            "SELECT * FROM palaces
             WHERE owner_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?
        .into_iter()
        .map(PalaceRow::into_data)
        .collect()
    }

    async fn count_palaces(&self, owner_id: PrimaryKey) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM palaces WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_palace(&self, new_palace: NewPalace) -> Result<PalaceData> {
        let now = Utc::now();

        sqlx::query_as::<_, PalaceRow>(
            "INSERT INTO palaces (id, owner_id, name, description, kind, is_public, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_palace.owner_id)
        .bind(&new_palace.name)
        .bind(&new_palace.description)
        .bind(new_palace.kind.as_str())
        .bind(new_palace.is_public)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?
        .into_data()
    }

    async fn update_palace(&self, updated_palace: UpdatedPalace) -> Result<PalaceData> {
        let result = sqlx::query(
            "UPDATE palaces SET
                name = $1,
                description = $2,
                kind = $3,
                is_public = $4,
                updated_at = $5
            WHERE id = $6 AND owner_id = $7",
        )
        .bind(&updated_palace.name)
        .bind(&updated_palace.description)
        .bind(updated_palace.kind.as_str())
        .bind(updated_palace.is_public)
        .bind(Utc::now())
        .bind(updated_palace.id)
        .bind(updated_palace.owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "palace",
                identifier: "id",
            });
        }

        self.palace_by_id(updated_palace.id, updated_palace.owner_id)
            .await
    }

    async fn delete_palace(&self, palace_id: PrimaryKey, owner_id: PrimaryKey) -> Result<()> {
        // Rooms, items, and study sessions go with it through the cascade rules
        let result = sqlx::query("DELETE FROM palaces WHERE id = $1 AND owner_id = $2")
            .bind(palace_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "palace",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn set_palace_image(
        &self,
        palace_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<PalaceData> {
        let result =
            sqlx::query("UPDATE palaces SET image = $1, updated_at = $2 WHERE id = $3 AND owner_id = $4")
                .bind(image)
                .bind(Utc::now())
                .bind(palace_id)
                .bind(owner_id)
                .execute(&self.pool)
                .await
                .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "palace",
                identifier: "id",
            });
        }

        self.palace_by_id(palace_id, owner_id).await
    }

    async fn room_by_id(&self, room_id: PrimaryKey, owner_id: PrimaryKey) -> Result<RoomData> {
        sqlx::query_as::<_, RoomRow>(
            "SELECT rooms.* FROM rooms
                INNER JOIN palaces ON rooms.palace_id = palaces.id
             WHERE rooms.id = $1 AND palaces.owner_id = $2",
        )
        .bind(room_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn rooms_in_palace(&self, palace_id: PrimaryKey) -> Result<Vec<RoomData>> {
        sqlx::query_as::<_, RoomRow>(
            "SELECT * FROM rooms WHERE palace_id = $1 ORDER BY display_order, name",
        )
        .bind(palace_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Into::into).collect())
        .map_err(|e| e.any())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        sqlx::query_as::<_, RoomRow>(
            "INSERT INTO rooms (id, palace_id, name, description, display_order, x_coordinate, y_coordinate)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_room.palace_id)
        .bind(&new_room.name)
        .bind(&new_room.description)
        .bind(new_room.order)
        .bind(new_room.x_coordinate)
        .bind(new_room.y_coordinate)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.conflict_or_any("room", "order", new_room.order.to_string()))
    }

    async fn set_room_image(
        &self,
        room_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<RoomData> {
        let result = sqlx::query(
            "UPDATE rooms SET image = $1
             FROM palaces
             WHERE rooms.palace_id = palaces.id AND rooms.id = $2 AND palaces.owner_id = $3",
        )
        .bind(image)
        .bind(room_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        self.room_by_id(room_id, owner_id).await
    }

    async fn item_by_id(
        &self,
        item_id: PrimaryKey,
        owner_id: PrimaryKey,
    ) -> Result<MemoryItemData> {
        sqlx::query_as::<_, MemoryItemRow>(
            "SELECT memory_items.* FROM memory_items
                INNER JOIN rooms ON memory_items.room_id = rooms.id
                INNER JOIN palaces ON rooms.palace_id = palaces.id
             WHERE memory_items.id = $1 AND palaces.owner_id = $2",
        )
        .bind(item_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("memory item", "id"))?
        .into_data()
    }

    async fn items_in_room(&self, room_id: PrimaryKey) -> Result<Vec<MemoryItemData>> {
        sqlx::query_as::<_, MemoryItemRow>(
            "SELECT * FROM memory_items WHERE room_id = $1 ORDER BY position, created_at",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?
        .into_iter()
        .map(MemoryItemRow::into_data)
        .collect()
    }

    async fn items_in_palace(&self, palace_id: PrimaryKey) -> Result<Vec<MemoryItemData>> {
        sqlx::query_as::<_, MemoryItemRow>(
            "SELECT memory_items.* FROM memory_items
                INNER JOIN rooms ON memory_items.room_id = rooms.id
             WHERE rooms.palace_id = $1
             ORDER BY rooms.display_order, rooms.name, memory_items.position, memory_items.created_at",
        )
        .bind(palace_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?
        .into_iter()
        .map(MemoryItemRow::into_data)
        .collect()
    }

    async fn create_item(&self, new_item: NewMemoryItem) -> Result<MemoryItemData> {
        let now = Utc::now();

        sqlx::query_as::<_, MemoryItemRow>(
            "INSERT INTO memory_items (id, room_id, content, kind, mnemonic_hint, position, created_at, last_reviewed)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_item.room_id)
        .bind(&new_item.content)
        .bind(new_item.kind.as_str())
        .bind(&new_item.mnemonic_hint)
        .bind(new_item.position)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or_any("memory item", "position", new_item.position.to_string()))?
        .into_data()
    }

    async fn toggle_item_mastery(
        &self,
        item_id: PrimaryKey,
        owner_id: PrimaryKey,
        reviewed_at: DateTime<Utc>,
    ) -> Result<MemoryItemData> {
        // Flip and stamp in a single statement so the update is atomic
        sqlx::query_as::<_, MemoryItemRow>(
            "UPDATE memory_items SET
                is_mastered = NOT is_mastered,
                last_reviewed = $3
             FROM rooms, palaces
             WHERE memory_items.room_id = rooms.id
                AND rooms.palace_id = palaces.id
                AND memory_items.id = $1
                AND palaces.owner_id = $2
             RETURNING memory_items.*",
        )
        .bind(item_id)
        .bind(owner_id)
        .bind(reviewed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("memory item", "id"))?
        .into_data()
    }

    async fn set_item_image(
        &self,
        item_id: PrimaryKey,
        owner_id: PrimaryKey,
        image: &str,
    ) -> Result<MemoryItemData> {
        let result = sqlx::query(
            "UPDATE memory_items SET image = $1
             FROM rooms, palaces
             WHERE memory_items.room_id = rooms.id
                AND rooms.palace_id = palaces.id
                AND memory_items.id = $2
                AND palaces.owner_id = $3",
        )
        .bind(image)
        .bind(item_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "memory item",
                identifier: "id",
            });
        }

        self.item_by_id(item_id, owner_id).await
    }

    async fn palace_item_stats(&self, palace_id: PrimaryKey) -> Result<ItemStats> {
        let row = sqlx::query_as::<_, ItemStatsRow>(
            "SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE is_mastered) AS mastered
             FROM memory_items
                INNER JOIN rooms ON memory_items.room_id = rooms.id
             WHERE rooms.palace_id = $1",
        )
        .bind(palace_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(ItemStats {
            total: row.total,
            mastered: row.mastered,
        })
    }

    async fn create_study_session(
        &self,
        new_session: NewStudySession,
    ) -> Result<StudySessionData> {
        sqlx::query_as::<_, StudySessionRow>(
            "INSERT INTO study_sessions (id, user_id, palace_id, started_at)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new_session.user_id)
        .bind(new_session.palace_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn study_session_by_id(
        &self,
        session_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<StudySessionData> {
        sqlx::query_as::<_, StudySessionRow>(
            "SELECT * FROM study_sessions WHERE id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("study session", "id"))
    }

    async fn complete_study_session(
        &self,
        completed: CompletedStudySession,
    ) -> Result<StudySessionData> {
        sqlx::query_as::<_, StudySessionRow>(
            "UPDATE study_sessions SET
                completed_at = $1,
                items_reviewed = $2,
                items_mastered = $3,
                accuracy_score = $4
             WHERE id = $5 AND user_id = $6
             RETURNING *",
        )
        .bind(completed.completed_at)
        .bind(completed.items_reviewed)
        .bind(completed.items_mastered)
        .bind(completed.accuracy_score)
        .bind(completed.id)
        .bind(completed.user_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("study session", "id"))
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: String,
    ) -> DatabaseError {
        match &self {
            SqlxError::Database(e) if e.is_unique_violation() => DatabaseError::Conflict {
                resource,
                field,
                value,
            },
            _ => self.any(),
        }
    }
}

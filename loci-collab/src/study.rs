use chrono::Utc;

use crate::{
    CollabContext, Database, DatabaseError, MemoryItemData, NewStudySession, PalaceData,
    PrimaryKey, RoomData, StudySessionData,
};

/// Manages the study session lifecycle: start, view, complete.
pub struct StudyManager<Db> {
    context: CollabContext<Db>,
}

/// An active or completed session gathered for presentation
#[derive(Debug)]
pub struct StudySessionView {
    pub session: StudySessionData,
    pub palace: PalaceData,
    pub rooms: Vec<RoomData>,
    /// Every item of the palace, room by room in display order
    pub items: Vec<MemoryItemData>,
}

impl<Db> StudyManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Starts a new session over a palace the user owns, with counts zeroed
    pub async fn start(
        &self,
        user_id: PrimaryKey,
        palace_id: PrimaryKey,
    ) -> Result<StudySessionData, DatabaseError> {
        self.context.database.palace_by_id(palace_id, user_id).await?;

        self.context
            .database
            .create_study_session(NewStudySession {
                user_id,
                palace_id,
            })
            .await
    }

    /// Gathers the session's palace, rooms, and items for presentation.
    /// Mutates nothing.
    pub async fn view(
        &self,
        user_id: PrimaryKey,
        session_id: PrimaryKey,
    ) -> Result<StudySessionView, DatabaseError> {
        let session = self
            .context
            .database
            .study_session_by_id(session_id, user_id)
            .await?;

        let palace = self
            .context
            .database
            .palace_by_id(session.palace_id, user_id)
            .await?;

        let rooms = self.context.database.rooms_in_palace(palace.id).await?;
        let items = self.context.database.items_in_palace(palace.id).await?;

        Ok(StudySessionView {
            session,
            palace,
            rooms,
            items,
        })
    }

    /// Completes a session with the caller-supplied counts.
    ///
    /// The counts are taken as-is without cross-checking them against the
    /// palace's actual item count, and completing an already-completed
    /// session simply records the new counts. Both match the observed
    /// behavior of the workflow this models.
    pub async fn complete(
        &self,
        user_id: PrimaryKey,
        session_id: PrimaryKey,
        items_reviewed: i32,
        items_mastered: i32,
    ) -> Result<StudySessionData, DatabaseError> {
        let session = self
            .context
            .database
            .study_session_by_id(session_id, user_id)
            .await?;

        let accuracy_score = if items_reviewed > 0 {
            f64::from(items_mastered) / f64::from(items_reviewed) * 100.
        } else {
            0.
        };

        self.context
            .database
            .complete_study_session(crate::CompletedStudySession {
                id: session.id,
                user_id,
                completed_at: Utc::now(),
                items_reviewed,
                items_mastered,
                accuracy_score,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Collab, CollabConfig, MemoryDatabase, MemoryItemKind, NewMemoryItem, NewPalace, NewRoom,
        NewUser, PalaceKind, UserData,
    };

    async fn collab() -> (Collab<MemoryDatabase>, UserData, PalaceData) {
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

        let palace = collab
            .palaces
            .create(NewPalace {
                owner_id: user.id,
                name: "Childhood home".to_string(),
                description: String::new(),
                kind: PalaceKind::House,
                is_public: false,
            })
            .await
            .expect("creates palace");

        (collab, user, palace)
    }

    #[tokio::test]
    async fn starting_creates_an_active_session_with_zeroed_counts() {
        let (collab, user, palace) = collab().await;

        let session = collab.study.start(user.id, palace.id).await.expect("starts");

        assert!(session.completed_at.is_none());
        assert_eq!(session.items_reviewed, 0);
        assert_eq!(session.items_mastered, 0);
        assert_eq!(session.accuracy_score, 0.);
        assert!(session.duration().is_none());
    }

    #[tokio::test]
    async fn starting_on_a_foreign_palace_reads_as_not_found() {
        let (collab, _, palace) = collab().await;

        let other = collab
            .database()
            .create_user(NewUser {
                username: "someone-else".to_string(),
                password: "hash".to_string(),
                display_name: "Someone else".to_string(),
            })
            .await
            .expect("creates user");

        let result = collab.study.start(other.id, palace.id).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn completing_computes_the_accuracy_percentage() {
        let (collab, user, palace) = collab().await;
        let session = collab.study.start(user.id, palace.id).await.expect("starts");

        let completed = collab
            .study
            .complete(user.id, session.id, 10, 7)
            .await
            .expect("completes");

        assert_eq!(completed.accuracy_score, 70.0);
        assert_eq!(completed.items_reviewed, 10);
        assert_eq!(completed.items_mastered, 7);
        assert!(completed.completed_at.is_some());
        assert!(completed.duration().is_some());
    }

    #[tokio::test]
    async fn completing_with_nothing_reviewed_scores_zero() {
        let (collab, user, palace) = collab().await;
        let session = collab.study.start(user.id, palace.id).await.expect("starts");

        let completed = collab
            .study
            .complete(user.id, session.id, 0, 0)
            .await
            .expect("completes");

        assert_eq!(completed.accuracy_score, 0.);
    }

    #[tokio::test]
    async fn viewing_gathers_items_in_room_then_position_order() {
        let (collab, user, palace) = collab().await;

        let second_room = collab
            .palaces
            .create_room(
                user.id,
                NewRoom {
                    palace_id: palace.id,
                    name: "Kitchen".to_string(),
                    description: String::new(),
                    order: 2,
                    x_coordinate: 0.,
                    y_coordinate: 0.,
                },
            )
            .await
            .expect("creates room");
        let first_room = collab
            .palaces
            .create_room(
                user.id,
                NewRoom {
                    palace_id: palace.id,
                    name: "Hallway".to_string(),
                    description: String::new(),
                    order: 1,
                    x_coordinate: 0.,
                    y_coordinate: 0.,
                },
            )
            .await
            .expect("creates room");

        for (room_id, content, position) in [
            (second_room.id, "kitchen second", 2),
            (second_room.id, "kitchen first", 1),
            (first_room.id, "hallway only", 1),
        ] {
            collab
                .palaces
                .create_item(
                    user.id,
                    palace.id,
                    NewMemoryItem {
                        room_id,
                        content: content.to_string(),
                        kind: MemoryItemKind::Text,
                        mnemonic_hint: String::new(),
                        position,
                    },
                )
                .await
                .expect("creates item");
        }

        let session = collab.study.start(user.id, palace.id).await.expect("starts");
        let view = collab.study.view(user.id, session.id).await.expect("views");

        assert_eq!(view.rooms.len(), 2);
        assert_eq!(view.rooms[0].name, "Hallway");

        let contents: Vec<_> = view.items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["hallway only", "kitchen first", "kitchen second"]
        );
    }
}

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json,
};
use loci_collab::{NewMemoryItem, NewPalace, NewRoom, UpdatedPalace};
use uuid::Uuid;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewMemoryItemSchema, NewRoomSchema, PageQuery, PalaceSchema, ValidatedJson},
    serialized::{
        DeletionResult, MemoryItemResult, PalaceDetail, PalacePage, PalaceResult, RoomDetail,
        RoomResult, StudySession, ToSerialized,
    },
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/palaces",
    tag = "palaces",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PalacePage)
    )
)]
async fn list_palaces(
    session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<PageQuery>,
) -> ServerResult<Json<PalacePage>> {
    let page = context
        .collab
        .palaces
        .list(session.user().id, query.page.unwrap_or(1))
        .await?;

    Ok(Json(page.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/palaces",
    tag = "palaces",
    request_body = PalaceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PalaceResult)
    )
)]
async fn create_palace(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<PalaceSchema>,
) -> ServerResult<Json<PalaceResult>> {
    let palace = context
        .collab
        .palaces
        .create(NewPalace {
            owner_id: session.user().id,
            name: body.name,
            description: body.description,
            kind: body.kind,
            is_public: body.is_public,
        })
        .await?;

    Ok(Json(PalaceResult {
        message: "Memory palace created successfully!".to_string(),
        palace: palace.to_serialized(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/palaces/{palace_id}",
    tag = "palaces",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PalaceDetail)
    )
)]
async fn palace_detail(
    session: Session,
    State(context): State<ServerContext>,
    Path(palace_id): Path<Uuid>,
) -> ServerResult<Json<PalaceDetail>> {
    let detail = context
        .collab
        .palaces
        .detail(session.user().id, palace_id)
        .await?;

    Ok(Json(detail.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/palaces/{palace_id}",
    tag = "palaces",
    request_body = PalaceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PalaceResult)
    )
)]
async fn update_palace(
    session: Session,
    State(context): State<ServerContext>,
    Path(palace_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<PalaceSchema>,
) -> ServerResult<Json<PalaceResult>> {
    let palace = context
        .collab
        .palaces
        .update(UpdatedPalace {
            id: palace_id,
            owner_id: session.user().id,
            name: body.name,
            description: body.description,
            kind: body.kind,
            is_public: body.is_public,
        })
        .await?;

    Ok(Json(PalaceResult {
        message: "Memory palace updated successfully!".to_string(),
        palace: palace.to_serialized(),
    }))
}

#[utoipa::path(
    delete,
    path = "/v1/palaces/{palace_id}",
    tag = "palaces",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = DeletionResult)
    )
)]
async fn delete_palace(
    session: Session,
    State(context): State<ServerContext>,
    Path(palace_id): Path<Uuid>,
) -> ServerResult<Json<DeletionResult>> {
    context
        .collab
        .palaces
        .delete(session.user().id, palace_id)
        .await?;

    Ok(Json(DeletionResult {
        message: "Memory palace deleted successfully!".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/palaces/{palace_id}/image",
    tag = "palaces",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PalaceResult)
    )
)]
async fn upload_palace_image(
    session: Session,
    State(context): State<ServerContext>,
    Path(palace_id): Path<Uuid>,
    body: Bytes,
) -> ServerResult<Json<PalaceResult>> {
    let palace = context
        .collab
        .palaces
        .attach_palace_image(session.user().id, palace_id, &body)
        .await?;

    Ok(Json(PalaceResult {
        message: "Memory palace updated successfully!".to_string(),
        palace: palace.to_serialized(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/palaces/{palace_id}/rooms",
    tag = "palaces",
    request_body = NewRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RoomResult)
    )
)]
async fn create_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(palace_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<RoomResult>> {
    // The parent linkage comes from the resolved path, never the body
    let room = context
        .collab
        .palaces
        .create_room(
            session.user().id,
            NewRoom {
                palace_id,
                name: body.name,
                description: body.description,
                order: body.order,
                x_coordinate: body.x_coordinate,
                y_coordinate: body.y_coordinate,
            },
        )
        .await?;

    Ok(Json(RoomResult {
        message: "Room added successfully!".to_string(),
        room: room.to_serialized(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/palaces/{palace_id}/rooms/{room_id}",
    tag = "palaces",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RoomDetail)
    )
)]
async fn room_detail(
    session: Session,
    State(context): State<ServerContext>,
    Path((palace_id, room_id)): Path<(Uuid, Uuid)>,
) -> ServerResult<Json<RoomDetail>> {
    let detail = context
        .collab
        .palaces
        .room_detail(session.user().id, palace_id, room_id)
        .await?;

    Ok(Json(detail.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/palaces/{palace_id}/rooms/{room_id}/image",
    tag = "palaces",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RoomResult)
    )
)]
async fn upload_room_image(
    session: Session,
    State(context): State<ServerContext>,
    Path((palace_id, room_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> ServerResult<Json<RoomResult>> {
    // Resolve the full path chain before touching anything
    context
        .collab
        .palaces
        .room_detail(session.user().id, palace_id, room_id)
        .await?;

    let room = context
        .collab
        .palaces
        .attach_room_image(session.user().id, room_id, &body)
        .await?;

    Ok(Json(RoomResult {
        message: "Room updated successfully!".to_string(),
        room: room.to_serialized(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/palaces/{palace_id}/rooms/{room_id}/items",
    tag = "palaces",
    request_body = NewMemoryItemSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = MemoryItemResult)
    )
)]
async fn create_item(
    session: Session,
    State(context): State<ServerContext>,
    Path((palace_id, room_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(body): ValidatedJson<NewMemoryItemSchema>,
) -> ServerResult<Json<MemoryItemResult>> {
    let item = context
        .collab
        .palaces
        .create_item(
            session.user().id,
            palace_id,
            NewMemoryItem {
                room_id,
                content: body.content,
                kind: body.kind,
                mnemonic_hint: body.mnemonic_hint,
                position: body.position,
            },
        )
        .await?;

    Ok(Json(MemoryItemResult {
        message: "Memory item added successfully!".to_string(),
        item: item.to_serialized(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/palaces/{palace_id}/study",
    tag = "study",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = StudySession)
    )
)]
async fn start_study_session(
    session: Session,
    State(context): State<ServerContext>,
    Path(palace_id): Path<Uuid>,
) -> ServerResult<Json<StudySession>> {
    let study_session = context
        .collab
        .study
        .start(session.user().id, palace_id)
        .await?;

    Ok(Json(study_session.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_palaces))
        .route("/", post(create_palace))
        .route("/:palace_id", get(palace_detail))
        .route("/:palace_id", put(update_palace))
        .route("/:palace_id", delete(delete_palace))
        .route("/:palace_id/image", post(upload_palace_image))
        .route("/:palace_id/rooms", post(create_room))
        .route("/:palace_id/rooms/:room_id", get(room_detail))
        .route("/:palace_id/rooms/:room_id/image", post(upload_room_image))
        .route("/:palace_id/rooms/:room_id/items", post(create_item))
        .route("/:palace_id/study", post(start_study_session))
}

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::post,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{MemoryItemResult, ToSerialized, ToggleMasteryResult},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/items/{item_id}/toggle-mastery",
    tag = "items",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = ToggleMasteryResult)
    )
)]
async fn toggle_mastery(
    session: Session,
    State(context): State<ServerContext>,
    Path(item_id): Path<Uuid>,
) -> ServerResult<Json<ToggleMasteryResult>> {
    let item = context
        .collab
        .palaces
        .toggle_mastery(session.user().id, item_id)
        .await?;

    Ok(Json(ToggleMasteryResult {
        success: true,
        is_mastered: item.is_mastered,
    }))
}

/// Any method other than POST gets a structured failure and no state change
async fn toggle_mastery_rejected() -> Json<ToggleMasteryResult> {
    Json(ToggleMasteryResult {
        success: false,
        is_mastered: false,
    })
}

#[utoipa::path(
    post,
    path = "/v1/items/{item_id}/image",
    tag = "items",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = MemoryItemResult)
    )
)]
async fn upload_item_image(
    session: Session,
    State(context): State<ServerContext>,
    Path(item_id): Path<Uuid>,
    body: Bytes,
) -> ServerResult<Json<MemoryItemResult>> {
    let item = context
        .collab
        .palaces
        .attach_item_image(session.user().id, item_id, &body)
        .await?;

    Ok(Json(MemoryItemResult {
        message: "Memory item updated successfully!".to_string(),
        item: item.to_serialized(),
    }))
}

pub fn router() -> Router {
    Router::new()
        .route(
            "/:item_id/toggle-mastery",
            post(toggle_mastery).fallback(toggle_mastery_rejected),
        )
        .route("/:item_id/image", post(upload_item_image))
}

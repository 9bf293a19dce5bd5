use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{CompleteSessionSchema, ValidatedJson},
    serialized::{CompletionResult, StudySessionView, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}",
    tag = "study",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = StudySessionView)
    )
)]
async fn view_session(
    session: Session,
    State(context): State<ServerContext>,
    Path(session_id): Path<Uuid>,
) -> ServerResult<Json<StudySessionView>> {
    let view = context
        .collab
        .study
        .view(session.user().id, session_id)
        .await?;

    Ok(Json(view.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}",
    tag = "study",
    request_body = CompleteSessionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CompletionResult)
    )
)]
async fn complete_session(
    session: Session,
    State(context): State<ServerContext>,
    Path(session_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<CompleteSessionSchema>,
) -> ServerResult<Json<CompletionResult>> {
    let completed = context
        .collab
        .study
        .complete(
            session.user().id,
            session_id,
            body.items_reviewed,
            body.items_mastered,
        )
        .await?;

    Ok(Json(CompletionResult {
        message: format!(
            "Study session completed! Accuracy: {:.1}%",
            completed.accuracy_score
        ),
        session: completed.to_serialized(),
    }))
}

pub fn router() -> Router {
    Router::new()
        .route("/:session_id", get(view_session))
        .route("/:session_id", post(complete_session))
}

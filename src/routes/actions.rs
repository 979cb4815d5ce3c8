use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::action::{ActionRequest, ActionResponse},
    error::AppError,
    services::action_service,
    state::SharedState,
};

/// Routes handling tournament actions.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms/{code}/actions", post(submit_action))
}

/// Process one action (`start`, `pick`, `leave`, `extend`) for a room.
///
/// Validation failures come back as `{success: false, error}` with status
/// 200: they are typed outcomes of the protocol, safe to retry with the same
/// idempotency key. System faults (lock contention, storage loss) surface as
/// HTTP errors instead.
#[utoipa::path(
    post,
    path = "/rooms/{code}/actions",
    tag = "actions",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Action outcome", body = ActionResponse),
        (status = 503, description = "Room busy or storage unavailable")
    )
)]
pub async fn submit_action(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<ActionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    match action_service::process(&state, &code, payload).await {
        Ok(response) => Ok(Json(response)),
        Err(err) if err.is_validation() => Ok(Json(ActionResponse::rejected(err.to_string()))),
        Err(err) => Err(err.into()),
    }
}

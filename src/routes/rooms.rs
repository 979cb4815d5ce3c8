use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        personalized::PersonalizedState,
        room::{CreateRoomRequest, JoinRoomRequest, RoomSummary, StateQuery},
    },
    error::AppError,
    services::{room_service, view_service},
    state::SharedState,
};

/// Routes handling room bootstrap and personalized state reads.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/state", get(room_state))
}

/// Open a fresh room; the caller becomes its owner.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomSummary)
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = room_service::create_room(&state, payload).await?;
    Ok(Json(summary))
}

/// Join an existing waiting room as the second participant.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "rooms",
    params(("code" = String, Path, description = "Join code of the room")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined", body = RoomSummary)
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = room_service::join_room(&state, &code, payload).await?;
    Ok(Json(summary))
}

/// Read the requesting participant's personalized state without mutating
/// anything.
#[utoipa::path(
    get,
    path = "/rooms/{code}/state",
    tag = "rooms",
    params(
        ("code" = String, Path, description = "Join code of the room"),
        ("userId" = String, Query, description = "Participant whose view is requested")
    ),
    responses(
        (status = 200, description = "Personalized state", body = PersonalizedState)
    )
)]
pub async fn room_state(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<StateQuery>,
) -> Result<Json<PersonalizedState>, AppError> {
    let code = room_service::normalize_code(&code)?;
    let view = view_service::load_personalized_state(&state, &code, query.user_id).await?;
    Ok(Json(view))
}

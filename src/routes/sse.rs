use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::{room_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Join code of the room")),
    responses((status = 200, description = "Room event stream", content_type = "text/event-stream", body = String))
)]
/// Stream a room's canonical-state events to a connected client.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let code = room_service::normalize_code(&code)?;

    let receiver = sse_service::subscribe_room(&state, &code);
    info!(code, "new room SSE connection");
    sse_service::broadcast_handshake(&state, &code).await;
    Ok(sse_service::to_sse_stream(receiver, code))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/events", get(room_stream))
}

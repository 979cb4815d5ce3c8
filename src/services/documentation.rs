use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the movie-night backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::room_state,
        crate::routes::actions::submit_action,
        crate::routes::sse::room_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::RoomSummary,
            crate::dto::action::ActionRequest,
            crate::dto::action::ActionResponse,
            crate::dto::personalized::PersonalizedState,
            crate::dto::sse::StateChangedEvent,
            crate::dto::sse::TournamentCompletedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room bootstrap and state reads"),
        (name = "actions", description = "Tournament action processing"),
        (name = "sse", description = "Server-sent event streams"),
    )
)]
pub struct ApiDoc;

use utoipa::OpenApi;

/// Aggregated OpenAPI specification for the backend.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::public::get_current_joke,
        crate::routes::public::list_jokes,
        crate::routes::public::get_joke_tallies,
        crate::routes::public::submit_reaction,
        crate::routes::admin::create_joke,
        crate::routes::admin::next_joke,
    ),
    components(
        schemas(
            crate::dao::models::Category,
            crate::dto::health::HealthResponse,
            crate::dto::admin::CreateJokeRequest,
            crate::dto::joke::JokeSummary,
            crate::dto::joke::TallyCount,
            crate::dto::joke::CurrentJokeResponse,
            crate::dto::joke::JokeListResponse,
            crate::dto::joke::TalliesResponse,
            crate::dto::reaction::ReactionRequest,
            crate::dto::reaction::TallySnapshot,
            crate::dto::sse::AdminHandshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::JokeActivatedEvent,
            crate::dto::sse::TallyUpdatedEvent,
            crate::dto::sse::ChannelDownEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Viewer-facing joke and reaction endpoints"),
        (name = "admin", description = "Operator endpoints for the joke catalog and rotation"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;

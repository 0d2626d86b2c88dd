use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::{admin::CreateJokeRequest, joke::JokeSummary},
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Operator-only endpoints for the joke catalog and stage rotation.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/jokes", post(create_joke))
        .route("/admin/jokes/next", post(next_joke))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Add a joke to the catalog.
#[utoipa::path(
    post,
    path = "/admin/jokes",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreateJokeRequest,
    responses((status = 200, description = "Joke created", body = JokeSummary))
)]
pub async fn create_joke(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateJokeRequest>>,
) -> Result<Json<JokeSummary>, AppError> {
    Ok(Json(admin_service::create_joke(&state, payload).await?))
}

/// Rotate the stage to the next joke.
#[utoipa::path(
    post,
    path = "/admin/jokes/next",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Next joke now active", body = JokeSummary),
        (status = 404, description = "Catalog is empty"),
        (status = 409, description = "Another operator rotated concurrently")
    )
)]
pub async fn next_joke(State(state): State<SharedState>) -> Result<Json<JokeSummary>, AppError> {
    Ok(Json(admin_service::next_joke(&state).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let expected = {
        let guard = state.admin_token().lock().await;
        guard.clone()
    };

    match expected {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        joke::{CurrentJokeResponse, JokeListResponse, TalliesResponse},
        reaction::{ReactionRequest, TallySnapshot},
    },
    error::AppError,
    services::{public_service, reaction_service},
    state::SharedState,
};

/// Viewer-facing endpoints: the current joke, the catalog and reactions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/joke", get(get_current_joke))
        .route("/public/jokes", get(list_jokes))
        .route("/public/jokes/{id}/tallies", get(get_joke_tallies))
        .route("/public/reactions", post(submit_reaction))
}

/// Return the joke currently on stage together with its tallies.
#[utoipa::path(
    get,
    path = "/public/joke",
    tag = "public",
    responses(
        (status = 200, description = "Current joke and tallies", body = CurrentJokeResponse),
        (status = 404, description = "No active joke")
    )
)]
pub async fn get_current_joke(
    State(state): State<SharedState>,
) -> Result<Json<CurrentJokeResponse>, AppError> {
    let payload = public_service::get_current_joke(&state).await?;
    Ok(Json(payload))
}

/// Return the whole joke catalog in creation order.
#[utoipa::path(
    get,
    path = "/public/jokes",
    tag = "public",
    responses((status = 200, description = "Catalog in creation order", body = JokeListResponse))
)]
pub async fn list_jokes(
    State(state): State<SharedState>,
) -> Result<Json<JokeListResponse>, AppError> {
    let payload = public_service::list_jokes(&state).await?;
    Ok(Json(payload))
}

/// Return the reaction counters recorded for one joke.
#[utoipa::path(
    get,
    path = "/public/jokes/{id}/tallies",
    tag = "public",
    params(("id" = String, Path, description = "Identifier of the joke")),
    responses(
        (status = 200, description = "Reaction counters", body = TalliesResponse),
        (status = 404, description = "Unknown joke")
    )
)]
pub async fn get_joke_tallies(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TalliesResponse>, AppError> {
    let payload = public_service::get_tallies(&state, id).await?;
    Ok(Json(payload))
}

/// Accept one viewer reaction and return the new authoritative tally.
#[utoipa::path(
    post,
    path = "/public/reactions",
    tag = "public",
    request_body = ReactionRequest,
    responses(
        (status = 200, description = "Reaction accepted", body = TallySnapshot),
        (status = 404, description = "Unknown joke"),
        (status = 409, description = "Already reacted, or the counter stayed contended")
    )
)]
pub async fn submit_reaction(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ReactionRequest>>,
) -> Result<Json<TallySnapshot>, AppError> {
    let snapshot = reaction_service::submit_reaction(&state, payload).await?;
    Ok(Json(snapshot))
}

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::{game::GameListResponse, public::SessionSnapshot},
    error::AppError,
    services::coordinator,
    state::SharedState,
};

/// Routes for browsing games without a WebSocket connection.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games))
        .route("/games/{id}", get(find_game))
}

/// List browsable games for the lobby browser.
pub async fn list_games(State(state): State<SharedState>) -> Json<GameListResponse> {
    let games = coordinator::list_games(&state).await;
    Json(GameListResponse { games })
}

/// Fetch the public snapshot of one game by session or lobby id.
pub async fn find_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = coordinator::find_game(&state, id).await?;
    Ok(Json(snapshot))
}

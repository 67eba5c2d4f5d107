use axum::{
    Json, Router, debug_handler,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;

use crate::{
    AppResult, AppState, RelayError,
    relay::{RelayHandle, Stats, protocol::RoomSummary},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{id}", delete(delete_room))
        .route("/stats", get(stats))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomQuery {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_rooms(State(relay): State<RelayHandle>) -> AppResult<Json<Vec<RoomSummary>>> {
    Ok(Json(relay.list_rooms().await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_room(
    State(relay): State<RelayHandle>,

    body: Result<Json<NewRoomQuery>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RoomSummary>)> {
    let Json(NewRoomQuery { name, description }) =
        body.map_err(|rejection| RelayError::MalformedEvent(rejection.body_text()))?;
    let room = relay.create_room(name, description).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room(
    State(relay): State<RelayHandle>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    relay.delete_room(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
pub(crate) async fn stats(State(relay): State<RelayHandle>) -> AppResult<Json<Stats>> {
    Ok(Json(relay.stats().await?))
}

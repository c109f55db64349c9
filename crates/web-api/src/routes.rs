use std::sync::Arc;

use application::{ApplicationError, ChatService, SessionToken};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use domain::{RoomId, SharedMessage};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::{
    auth::{session_from_headers, session_from_headers_or_query},
    error::ApiError,
    state::AppState,
    ws_connection::LiveViewConnection,
};

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    content: String,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LiveQuery {
    token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/rooms/{room_id}/messages",
            get(get_history).post(send_message),
        )
        .route("/rooms/{room_id}/live", get(live_view_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 会话校验通过后才会打开（或恢复）房间
async fn authorized_room(
    state: &AppState,
    session: &SessionToken,
    room_id: String,
) -> Result<Arc<ChatService>, ApiError> {
    let room_id = RoomId::parse(room_id).map_err(ApplicationError::from)?;
    Ok(state.rooms.room_for(session, &room_id).await?)
}

async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<SendMessagePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<SharedMessage>), ApiError> {
    let session = session_from_headers(&headers)?;
    let Json(payload) = payload?;
    let room = authorized_room(&state, &session, room_id).await?;
    let message = room.send_message(&session, &payload.content).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

async fn get_history(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Json<Vec<SharedMessage>>, ApiError> {
    let session = session_from_headers(&headers)?;
    let Query(query) = query?;
    let room = authorized_room(&state, &session, room_id).await?;
    let messages = room.history(&session, query.limit).await?;

    Ok(Json(messages))
}

/// 会话在升级前校验，失败时直接返回 HTTP 错误
async fn live_view_upgrade(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    query: Result<Query<LiveQuery>, QueryRejection>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let session = session_from_headers_or_query(&headers, query.token)?;
    let room = authorized_room(&state, &session, room_id).await?;
    let view = room.open_live_view(&session).await?;

    Ok(ws.on_upgrade(move |socket| LiveViewConnection::new(socket, room, view).run()))
}

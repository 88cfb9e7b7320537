//! HTTP command surface and the SSE push transport.
//!
//! Commands are plain request/response JSON under `/api/v1/game`; the push
//! stream is server-sent events, one `data:` frame per event record. This
//! layer authenticates callers through the [`IdentityResolver`]
//! collaborator and translates domain errors into HTTP statuses; all game
//! semantics live in the service.

use crate::auth::{Identity, IdentityResolver};
use crate::error::{ErrorKind, GameError};
use crate::events::{GameEvent, SubscriberHandle};
use crate::room::{RoomId, RoomSnapshot};
use crate::service::GameService;
use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::Utc;
use derive_more::From;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Idle interval after which the stream emits a heartbeat record.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The room/session manager.
    pub service: Arc<GameService>,
    /// Token-to-identity collaborator.
    pub identities: Arc<dyn IdentityResolver>,
}

/// Uniform response envelope, matching the command API's wire format.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// HTTP-style status code.
    pub code: u16,
    /// Human-readable outcome.
    pub msg: String,
    /// Optional payload.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(msg: impl Into<String>, data: Option<T>) -> Json<Self> {
        Json(Self {
            code: 200,
            msg: msg.into(),
            data,
        })
    }
}

/// Handler-level failure: either the caller could not be identified, or
/// the command was rejected by the domain.
#[derive(Debug, From)]
pub enum ApiError {
    /// Missing, malformed, or unknown credentials.
    Unauthorized,
    /// A rejected room/game command.
    #[from]
    Game(GameError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_string(),
            ),
            ApiError::Game(err) => {
                let status = match err.kind() {
                    ErrorKind::PreconditionFailed => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                };
                (status, err.to_string())
            }
        };
        let body = ApiResponse::<()> {
            code: status.as_u16(),
            msg,
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Join request body.
#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    /// Room to join.
    pub room_id: RoomId,
}

/// Move request body.
#[derive(Debug, Deserialize)]
pub struct MakeMoveRequest {
    /// Room the move targets.
    pub room_id: RoomId,
    /// Column, 0-14.
    pub x: i64,
    /// Row, 0-14.
    pub y: i64,
}

/// Start/restart request body.
#[derive(Debug, Deserialize)]
pub struct StartGameRequest {
    /// Room to start.
    pub room_id: RoomId,
}

/// Query parameters for the event stream. SSE clients cannot set headers,
/// so the token rides in the query string.
#[derive(Debug, Deserialize)]
pub struct EventStreamParams {
    /// Bearer token.
    pub access_token: Option<String>,
}

/// Builds the game router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/game/create-room", post(create_room))
        .route("/api/v1/game/join-room", post(join_room))
        .route("/api/v1/game/leave-room", post(leave_room))
        .route("/api/v1/game/make-move", post(make_move))
        .route("/api/v1/game/start-game", post(start_game))
        .route("/api/v1/game/restart-game", post(restart_game))
        .route("/api/v1/game/room/{room_id}", get(room_info))
        .route("/api/v1/game/events/{room_id}", get(stream_events))
        .with_state(state)
}

/// Binds and serves the API until the process exits.
pub async fn run(host: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(host, port, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Extracts the bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    state
        .identities
        .resolve(token)
        .await
        .ok_or(ApiError::Unauthorized)
}

#[instrument(skip(state, headers))]
async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<RoomId>>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    let room_id = state.service.create_room(&caller.user_id, &caller.username)?;
    Ok(ApiResponse::ok("room created", Some(room_id)))
}

#[instrument(skip(state, headers, req), fields(room_id = %req.room_id))]
async fn join_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    state
        .service
        .join_room(&req.room_id, &caller.user_id, &caller.username)?;
    Ok(ApiResponse::ok("joined room", None))
}

#[instrument(skip(state, headers))]
async fn leave_room(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    state.service.leave_room(&caller.user_id)?;
    Ok(ApiResponse::ok("left room", None))
}

#[instrument(skip(state, headers, req), fields(room_id = %req.room_id, x = req.x, y = req.y))]
async fn make_move(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MakeMoveRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    state
        .service
        .make_move(&req.room_id, &caller.user_id, req.x, req.y)?;
    Ok(ApiResponse::ok("move accepted", None))
}

#[instrument(skip(state, headers, req), fields(room_id = %req.room_id))]
async fn start_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartGameRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    state.service.start_game(&req.room_id, &caller.user_id)?;
    Ok(ApiResponse::ok("game started", None))
}

#[instrument(skip(state, headers, req), fields(room_id = %req.room_id))]
async fn restart_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartGameRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let caller = authenticate(&state, &headers).await?;
    state.service.restart_game(&req.room_id, &caller.user_id)?;
    Ok(ApiResponse::ok("game restarted", None))
}

#[instrument(skip(state, headers))]
async fn room_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<RoomId>,
) -> Result<Json<ApiResponse<RoomSnapshot>>, ApiError> {
    authenticate(&state, &headers).await?;
    let snapshot = state
        .service
        .get_room_info(&room_id)
        .ok_or(GameError::RoomNotFound { room_id })?;
    Ok(ApiResponse::ok("room info", Some(snapshot)))
}

/// Unsubscribes on drop, so a disconnecting client is unregistered without
/// waiting for a failed delivery to discover it.
struct SubscriptionGuard {
    service: Arc<GameService>,
    room_id: RoomId,
    handle: SubscriberHandle,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.service.unsubscribe(&self.room_id, self.handle);
    }
}

/// Attaches a caller to a room's event stream.
///
/// Only current room members may attach; outsiders get a single error
/// record rather than a live stream. For members, the delivery channel is
/// folded into an event stream: silence longer than the heartbeat interval
/// yields a heartbeat record instead of a frame gap, and the stream ends
/// when the room's channels close. Dropping the stream unsubscribes.
fn subscribe_stream(
    service: Arc<GameService>,
    room_id: RoomId,
    user_id: &str,
) -> Result<BoxStream<'static, GameEvent>, GameError> {
    if service.get_player_room(user_id).as_deref() != Some(room_id.as_str()) {
        let rejection = GameEvent::Error {
            message: "you are not in this room".to_string(),
            timestamp: Utc::now(),
        };
        return Ok(futures::stream::once(async move { rejection }).boxed());
    }

    let subscription = service.subscribe(&room_id)?;
    let guard = SubscriptionGuard {
        service,
        room_id,
        handle: subscription.handle,
    };

    Ok(futures::stream::unfold(
        (subscription.receiver, guard),
        |(mut receiver, guard)| async move {
            match tokio::time::timeout(HEARTBEAT_INTERVAL, receiver.recv()).await {
                Ok(Some(event)) => Some((event, (receiver, guard))),
                Ok(None) => None,
                Err(_) => Some((
                    GameEvent::Heartbeat {
                        timestamp: Utc::now(),
                    },
                    (receiver, guard),
                )),
            }
        },
    )
    .boxed())
}

#[instrument(skip(state, params))]
async fn stream_events(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    Query(params): Query<EventStreamParams>,
) -> Result<Sse<BoxStream<'static, Result<Event, Infallible>>>, ApiError> {
    let token = params.access_token.ok_or(ApiError::Unauthorized)?;
    let caller = state
        .identities
        .resolve(&token)
        .await
        .ok_or(ApiError::Unauthorized)?;

    let stream = subscribe_stream(Arc::clone(&state.service), room_id, &caller.user_id)?
        .map(|event| Ok(frame(&event)))
        .boxed();
    Ok(Sse::new(stream))
}

fn frame(event: &GameEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|err| {
        Event::default().data(format!(
            "{{\"type\":\"error\",\"message\":\"serialization failed: {err}\"}}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer tok1".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("tok1"));

        headers.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_error_frame_serializes() {
        let event = GameEvent::Error {
            message: "boom".into(),
            timestamp: Utc::now(),
        };
        // Must not fall back to the escape-hatch frame.
        let _ = frame(&event);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_stream_emits_heartbeat() {
        let service = GameService::new();
        let room_id = service.create_room("u1", "alice").unwrap();
        let mut stream = subscribe_stream(Arc::clone(&service), room_id, "u1").unwrap();

        assert!(matches!(
            stream.next().await,
            Some(GameEvent::RoomState { .. })
        ));
        // Nothing happens in the room; the clock runs out the idle window.
        assert!(matches!(
            stream.next().await,
            Some(GameEvent::Heartbeat { .. })
        ));
    }

    #[tokio::test]
    async fn test_outsider_gets_single_error_record() {
        let service = GameService::new();
        let room_id = service.create_room("u1", "alice").unwrap();
        let mut stream = subscribe_stream(Arc::clone(&service), room_id, "stranger").unwrap();

        assert!(matches!(stream.next().await, Some(GameEvent::Error { .. })));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_stream_unsubscribes() {
        let service = GameService::new();
        let room_id = service.create_room("u1", "alice").unwrap();
        let stream = subscribe_stream(Arc::clone(&service), room_id.clone(), "u1").unwrap();

        assert_eq!(service.subscriber_count(&room_id), 1);
        drop(stream);
        assert_eq!(service.subscriber_count(&room_id), 0);
    }

    #[tokio::test]
    async fn test_stream_ends_when_room_is_deleted() {
        let service = GameService::new();
        let room_id = service.create_room("u1", "alice").unwrap();
        let mut stream = subscribe_stream(Arc::clone(&service), room_id, "u1").unwrap();

        assert!(matches!(
            stream.next().await,
            Some(GameEvent::RoomState { .. })
        ));
        service.leave_room("u1").unwrap();
        assert!(matches!(
            stream.next().await,
            Some(GameEvent::PlayerLeft { .. })
        ));
        assert!(stream.next().await.is_none());
    }
}

//! HTTP API endpoints.
//!
//! Handlers only parse input and map results; all rules live in `AppState`.
//! Who is calling comes from the room credential in `Authorization: Bearer`,
//! never from ids in the request.

use axum::{
    extract::{
        rejection::JsonRejection, FromRequestParts, OptionalFromRequestParts, Path, State,
    },
    http::{header, request::Parts},
    routing::get,
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::code::normalize_room_code;
use crate::credential::{Claims, Credential};
use crate::error::{GameError, GameResult};
use crate::protocol::{
    ActionResponse, CreateRoomRequest, JoinResponse, JoinRoomRequest, RoomAction, RoomResponse,
};
use crate::state::AppState;
use crate::types::{room_topic, topic_room_code, Capability};
use crate::ws;

/// A caller holding a verified room credential
#[derive(Debug, Clone)]
pub struct Caller(pub Claims);

impl Caller {
    /// The caller's player id, provided the credential is for room `code`
    /// and grants `capability`
    fn member_of(&self, code: &str, capability: Capability) -> GameResult<&str> {
        let code = normalize_room_code(code).ok_or_else(GameError::room_not_found)?;
        if !self.0.allows(&room_topic(&code), capability) {
            return Err(GameError::Forbidden(
                "Credential is not valid for this room".to_string(),
            ));
        }
        Ok(&self.0.client_id)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = GameError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| GameError::Forbidden("Missing credential".to_string()))?;
        Ok(Caller(state.credentials.verify(token)?))
    }
}

/// No credential at all means an anonymous caller; a bad one is still rejected
impl OptionalFromRequestParts<Arc<AppState>> for Caller {
    type Rejection = GameError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => Ok(Some(Caller(state.credentials.verify(token)?))),
            None => Ok(None),
        }
    }
}

/// All routes, with `/ws` only when events are served in-process
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/join", post(join_room))
        .route("/api/rooms/{code}", get(get_room).post(room_action))
        .route("/api/credential", get(credential));

    if state.local.is_some() {
        app = app.route("/ws", get(ws::ws_handler));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Malformed bodies are the client's fault, reported like any other error
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> GameResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| GameError::InvalidInput(rejection.body_text()))
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> GameResult<Json<JoinResponse>> {
    let request = body(payload)?;
    Ok(Json(state.create_room(&request.player_name).await?))
}

/// POST /api/rooms/join
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JoinRoomRequest>, JsonRejection>,
) -> GameResult<Json<JoinResponse>> {
    let request = body(payload)?;
    Ok(Json(
        state
            .join_room(&request.room_code, &request.player_name)
            .await?,
    ))
}

/// GET /api/rooms/{code}
///
/// Without a credential the room is returned as anyone may see it.
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    caller: Option<Caller>,
) -> GameResult<Json<RoomResponse>> {
    let viewer = match &caller {
        Some(caller) => Some(caller.member_of(&code, Capability::Subscribe)?),
        None => None,
    };
    let room = state.get_room(&code, viewer).await?;
    Ok(Json(RoomResponse { room }))
}

/// POST /api/rooms/{code}
///
/// Body is tagged by `action`: start, catch, sound, reset or leave. The
/// acting player must be the credential holder.
pub async fn room_action(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    caller: Caller,
    payload: Result<Json<RoomAction>, JsonRejection>,
) -> GameResult<Json<ActionResponse>> {
    let action = body(payload)?;
    if action.player_id() != caller.member_of(&code, Capability::Publish)? {
        return Err(GameError::Forbidden(
            "Credential does not belong to the acting player".to_string(),
        ));
    }
    Ok(Json(state.dispatch(&code, action).await?))
}

/// GET /api/credential
///
/// Trades a still-valid credential for a fresh one, as long as its holder
/// is still in the room.
pub async fn credential(
    State(state): State<Arc<AppState>>,
    Caller(claims): Caller,
) -> GameResult<Json<Credential>> {
    let code = topic_room_code(&claims.topic)
        .ok_or_else(|| GameError::Forbidden("Credential is not for a room".to_string()))?;
    Ok(Json(state.issue_credential(code, &claims.client_id).await?))
}

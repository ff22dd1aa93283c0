//! REST command routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tictactoe_core::{SessionId, SessionSnapshot, User, UserRepository};
use tictactoe_session::{ManagerError, SessionCoordinator};
use tracing::{error, info, warn};

use crate::protocol::{
    CommandReply, CommandResult, CreateGameResponse, JoinGameRequest, MoveRequest,
    RegisterUserRequest,
};

type Coordinator<U> = Arc<SessionCoordinator<U>>;

/// Failure that is not a game-rule rejection.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Game not found: {0}")]
    NotFound(SessionId),
    #[error(transparent)]
    Internal(#[from] ManagerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(e) => {
                error!("Request failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

async fn register_user<U>(
    State(coordinator): State<Coordinator<U>>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<Json<User>, ApiError>
where
    U: UserRepository + 'static,
{
    info!(name = %req.user_name, "RegisterUser request");
    Ok(Json(coordinator.register_user(&req.user_name).await?))
}

async fn create_game<U>(State(coordinator): State<Coordinator<U>>) -> Json<CreateGameResponse>
where
    U: UserRepository + 'static,
{
    Json(CreateGameResponse {
        game_id: coordinator.create_game().await,
    })
}

/// Turn an unreadable command body into a rejection reply.
fn parse_body<T>(
    body: Result<Json<T>, JsonRejection>,
    on_error: CommandResult,
) -> Result<T, Json<CommandReply>> {
    body.map(|Json(req)| req).map_err(|e| {
        warn!("Malformed command body: {}", e.body_text());
        Json(CommandReply::rejected(on_error, e.body_text()))
    })
}

async fn join_game<U>(
    State(coordinator): State<Coordinator<U>>,
    body: Result<Json<JoinGameRequest>, JsonRejection>,
) -> Result<Json<CommandReply>, ApiError>
where
    U: UserRepository + 'static,
{
    let req = match parse_body(body, CommandResult::Denied) {
        Ok(req) => req,
        Err(reply) => return Ok(reply),
    };
    info!(game = %req.game_id, user = %req.user_id, symbol = %req.symbol, "JoinGame request");
    match coordinator
        .join_game(req.user_id, req.game_id, req.symbol)
        .await
    {
        Ok(()) => Ok(Json(CommandReply::accepted())),
        Err(ManagerError::InvalidJoin(e)) => {
            Ok(Json(CommandReply::rejected(CommandResult::Denied, e)))
        }
        Err(e) => Err(e.into()),
    }
}

async fn make_move<U>(
    State(coordinator): State<Coordinator<U>>,
    body: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<CommandReply>, ApiError>
where
    U: UserRepository + 'static,
{
    let req = match parse_body(body, CommandResult::InvalidMove) {
        Ok(req) => req,
        Err(reply) => return Ok(reply),
    };
    info!(
        game = %req.game_id,
        user = %req.user_id,
        symbol = %req.symbol,
        x = req.x.0,
        y = req.y.0,
        "MakeAMove request"
    );
    let (Some(row), Some(col)) = (req.x.index(), req.y.index()) else {
        return Ok(Json(CommandReply::rejected(
            CommandResult::InvalidMove,
            format!("Cell ({}, {}) is outside the board", req.x.0, req.y.0),
        )));
    };

    match coordinator
        .make_move(req.user_id, req.game_id, row, col, req.symbol)
        .await
    {
        Ok(_) => Ok(Json(CommandReply::accepted())),
        Err(ManagerError::InvalidMove(e)) => {
            Ok(Json(CommandReply::rejected(CommandResult::InvalidMove, e)))
        }
        Err(e) => Err(e.into()),
    }
}

async fn game_snapshot<U>(
    State(coordinator): State<Coordinator<U>>,
    Path(game_id): Path<SessionId>,
) -> Result<Json<SessionSnapshot>, ApiError>
where
    U: UserRepository + 'static,
{
    coordinator
        .snapshot(game_id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound(game_id))
}

/// Create the REST command router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_api_router(coordinator));
/// ```
#[must_use]
pub fn create_api_router<U>(coordinator: Coordinator<U>) -> Router
where
    U: UserRepository + 'static,
{
    Router::new()
        .route("/api/registerUser", post(register_user::<U>))
        .route("/api/createGame", post(create_game::<U>))
        .route("/api/joinGame", post(join_game::<U>))
        .route("/api/makeAMove", post(make_move::<U>))
        .route("/api/games/{game_id}", get(game_snapshot::<U>))
        .with_state(coordinator)
}

//! Wire protocol for client-server communication.

use serde::{Deserialize, Serialize};
use tictactoe_core::{GameEvent, SessionId, Symbol, UserId};

/// `POST /api/registerUser` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub user_name: String,
}

/// `POST /api/createGame` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    pub game_id: SessionId,
}

/// `POST /api/joinGame` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    pub user_id: UserId,
    pub game_id: SessionId,
    pub symbol: Symbol,
}

/// `POST /api/makeAMove` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub user_id: UserId,
    pub game_id: SessionId,
    pub symbol: Symbol,
    /// Row.
    pub x: Coordinate,
    /// Column.
    pub y: Coordinate,
}

/// Board index as sent by clients: a JSON number or a numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate(pub i64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCoordinate {
    Number(i64),
    Text(String),
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = String;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        match raw {
            RawCoordinate::Number(n) => Ok(Self(n)),
            RawCoordinate::Text(s) => s
                .trim()
                .parse()
                .map(Self)
                .map_err(|e| format!("invalid coordinate {s:?}: {e}")),
        }
    }
}

impl Coordinate {
    /// Index into the board, `None` if negative.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

/// Outcome of a join or move command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandResult {
    Accepted,
    Denied,
    InvalidMove,
}

/// Reply to a join or move command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub result: CommandResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CommandReply {
    #[must_use]
    pub const fn accepted() -> Self {
        Self {
            result: CommandResult::Accepted,
            reason: None,
        }
    }

    #[must_use]
    pub fn rejected(result: CommandResult, reason: impl ToString) -> Self {
        Self {
            result,
            reason: Some(reason.to_string()),
        }
    }
}

/// Message from a WebSocket client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving a game's events. Players pass their `userId`.
    Subscribe {
        #[serde(rename = "gameId")]
        game_id: SessionId,
        #[serde(rename = "userId", default)]
        user_id: Option<UserId>,
    },
    /// Stop receiving events.
    Unsubscribe,
    /// Ping for keepalive.
    Ping,
}

/// Connection-level message from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Subscription accepted.
    Subscribed {
        #[serde(rename = "gameId")]
        game_id: SessionId,
    },
    /// Subscription removed.
    Unsubscribed,
    /// Error message.
    Error { message: String },
    /// Pong response.
    Pong,
}

/// Message from server to a WebSocket client.
///
/// Game events go out verbatim (`{"event": ...}`); everything else is a
/// [`ControlMessage`] (`{"type": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Event(GameEvent),
    Control(ControlMessage),
}

impl ServerMessage {
    #[must_use]
    pub fn error(message: impl ToString) -> Self {
        Self::Control(ControlMessage::Error {
            message: message.to_string(),
        })
    }
}

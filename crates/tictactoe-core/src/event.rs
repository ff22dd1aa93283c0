//! Session events delivered to listeners.

use serde::{Deserialize, Serialize};

use crate::Symbol;

/// Terminal result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireResult", try_from = "WireResult")]
pub enum GameResult {
    /// Board filled with no completed line.
    Tie,
    /// The symbol that completed a line.
    Winner(Symbol),
}

// `{"result": "tie"}` or `{"winner": "cross"}`.
#[derive(Serialize, Deserialize)]
struct WireResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    winner: Option<Symbol>,
}

impl From<GameResult> for WireResult {
    fn from(result: GameResult) -> Self {
        match result {
            GameResult::Tie => Self {
                result: Some("tie".to_string()),
                winner: None,
            },
            GameResult::Winner(symbol) => Self {
                result: None,
                winner: Some(symbol),
            },
        }
    }
}

impl TryFrom<WireResult> for GameResult {
    type Error = String;

    fn try_from(wire: WireResult) -> Result<Self, Self::Error> {
        match (wire.result.as_deref(), wire.winner) {
            (_, Some(symbol)) => Ok(Self::Winner(symbol)),
            (Some("tie"), None) => Ok(Self::Tie),
            (other, None) => Err(format!("unknown game result: {other:?}")),
        }
    }
}

/// Event published on a session's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum GameEvent {
    /// Both players joined and are listening; Cross moves first.
    GameStarted,
    /// A move was accepted. `x` is the row, `y` the column.
    NewMove { x: usize, y: usize, symbol: Symbol },
    /// The game reached a terminal state.
    GameEnded(GameResult),
}

impl GameEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::GameStarted => "game-started",
            Self::NewMove { .. } => "new-move",
            Self::GameEnded(_) => "game-ended",
        }
    }
}

//! Game session state machine.
//!
//! `WaitingPlayers -> InProgress -> Ended`, never backwards. The session
//! itself is plain data; callers serialise access (one writer per session).

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    Board, BoardError, GameResult, Symbol,
    traits::{SessionId, User, UserId},
};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created; players may join.
    WaitingPlayers,
    /// Both players joined and attached; moves are accepted.
    InProgress,
    /// Won or tied. Terminal.
    Ended,
}

/// Outcome of a session so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "winner", rename_all = "snake_case")]
pub enum Outcome {
    /// No terminal result yet.
    #[default]
    Pending,
    /// Board filled with no line.
    Tie,
    /// A symbol completed a line.
    Winner(Symbol),
}

impl From<GameResult> for Outcome {
    fn from(result: GameResult) -> Self {
        match result {
            GameResult::Tie => Self::Tie,
            GameResult::Winner(symbol) => Self::Winner(symbol),
        }
    }
}

/// A user seated on one symbol. Identity is owned elsewhere; the name is
/// a cached copy for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub user_id: UserId,
    pub user_name: String,
}

/// Join rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Symbol {0} is already taken")]
    SymbolTaken(Symbol),
    #[error("User {0} already joined this session")]
    UserAlreadyJoined(UserId),
}

/// Start rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("Session not ready to start ({players} players, state {state:?})")]
    NotReady { players: usize, state: SessionState },
}

/// Move rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("Game is not in progress ({0:?})")]
    GameNotInProgress(SessionState),
    #[error("Wrong turn: {expected} to move, got {got}")]
    WrongTurn { expected: Symbol, got: Symbol },
    #[error("User {user} does not hold {symbol}")]
    UnknownPlayer { user: UserId, symbol: Symbol },
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub row: usize,
    pub col: usize,
    pub symbol: Symbol,
    /// Set when this move ended the game.
    pub result: Option<GameResult>,
}

/// One game instance between two players.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    board: Board,
    players: BTreeMap<Symbol, Player>,
    turn: Symbol,
    state: SessionState,
    outcome: Outcome,
}

impl Session {
    /// Create an empty session waiting for players.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            board: Board::new(),
            players: BTreeMap::new(),
            turn: Symbol::Cross,
            state: SessionState::WaitingPlayers,
            outcome: Outcome::Pending,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn turn(&self) -> Symbol {
        self.turn
    }

    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    #[must_use]
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// Player seated on `symbol`, if any.
    #[must_use]
    pub fn player(&self, symbol: Symbol) -> Option<&Player> {
        self.players.get(&symbol)
    }

    /// Symbol held by `user` in this session.
    #[must_use]
    pub fn symbol_of(&self, user: UserId) -> Option<Symbol> {
        self.players
            .iter()
            .find_map(|(symbol, p)| (p.user_id == user).then_some(*symbol))
    }

    /// True once both symbols have a player.
    #[must_use]
    pub fn both_players_joined(&self) -> bool {
        self.players.len() == Symbol::ALL.len()
    }

    /// Seat `user` on `symbol`.
    ///
    /// Does not start the game; that happens once both players are
    /// listening (see [`Session::start`]).
    ///
    /// # Errors
    /// Returns `SymbolTaken` if the symbol already has a player and
    /// `UserAlreadyJoined` if the user holds the other symbol.
    pub fn join(&mut self, user: &User, symbol: Symbol) -> Result<(), JoinError> {
        if self.players.contains_key(&symbol) {
            return Err(JoinError::SymbolTaken(symbol));
        }
        if self.symbol_of(user.id).is_some() {
            return Err(JoinError::UserAlreadyJoined(user.id));
        }

        self.players.insert(
            symbol,
            Player {
                user_id: user.id,
                user_name: user.name.clone(),
            },
        );
        debug!(session = %self.id, user = %user.id, %symbol, "player joined");
        Ok(())
    }

    /// Move from `WaitingPlayers` to `InProgress` with Cross to play.
    ///
    /// # Errors
    /// Returns `NotReady` unless both players joined and the session is
    /// still waiting.
    pub fn start(&mut self) -> Result<(), StartError> {
        if !self.both_players_joined() || self.state != SessionState::WaitingPlayers {
            return Err(StartError::NotReady {
                players: self.players.len(),
                state: self.state,
            });
        }

        self.state = SessionState::InProgress;
        self.turn = Symbol::Cross;
        info!(session = %self.id, "game started");
        Ok(())
    }

    /// Validate and apply a move.
    ///
    /// # Errors
    /// Checks, in order: the game is in progress, it is `symbol`'s turn,
    /// `user` holds `symbol`, then the board accepts the placement.
    pub fn make_move(
        &mut self,
        user: UserId,
        symbol: Symbol,
        row: usize,
        col: usize,
    ) -> Result<MoveOutcome, MoveError> {
        if self.state != SessionState::InProgress {
            return Err(MoveError::GameNotInProgress(self.state));
        }
        if symbol != self.turn {
            return Err(MoveError::WrongTurn {
                expected: self.turn,
                got: symbol,
            });
        }
        if self.players.get(&symbol).is_none_or(|p| p.user_id != user) {
            return Err(MoveError::UnknownPlayer { user, symbol });
        }

        self.board.place(row, col, symbol)?;
        self.turn = symbol.opponent();

        let result = if let Some(winner) = self.board.winner() {
            Some(GameResult::Winner(winner))
        } else if self.board.is_full() {
            Some(GameResult::Tie)
        } else {
            None
        };

        if let Some(result) = result {
            self.state = SessionState::Ended;
            self.outcome = result.into();
            info!(session = %self.id, ?result, "game ended");
        }

        Ok(MoveOutcome {
            row,
            col,
            symbol,
            result,
        })
    }

    /// Serialisable read-only view.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            turn: self.turn,
            board: self.board.clone(),
            players: self.players.clone(),
            outcome: self.outcome,
        }
    }
}

/// Point-in-time copy of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub turn: Symbol,
    pub board: Board,
    pub players: BTreeMap<Symbol, Player>,
    pub outcome: Outcome,
}

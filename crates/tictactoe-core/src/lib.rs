//! Core game logic for hosted tic-tac-toe sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `Board` - 3x3 grid with win/tie evaluation
//! - `Session` - Join/start/move state machine for one game
//! - `EventChannel` - Ordered per-session fan-out of `GameEvent`s
//! - `UserRepository` and `EventListener` collaborator traits

pub mod board;
pub mod channel;
pub mod event;
pub mod session;
pub mod traits;

pub use board::{Board, BoardError, Symbol};
pub use channel::{EventChannel, SubscriptionHandle, SubscriptionId, listener_stream};
pub use event::{GameEvent, GameResult};
pub use session::{
    JoinError, MoveError, MoveOutcome, Outcome, Player, Session, SessionSnapshot, SessionState,
    StartError,
};
pub use traits::{
    EventListener, ListenerError, SessionId, StorageError, User, UserId, UserRepository,
};

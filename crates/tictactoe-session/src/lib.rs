//! Session orchestration and user storage for tic-tac-toe.
//!
//! Provides:
//! - `SessionRegistry` - Owns every live session and its event channel
//! - `SessionCoordinator` - Single entry point for the transport layer
//! - User repositories (memory, JSON file)

pub mod coordinator;
pub mod registry;
pub mod storage;

pub use coordinator::{InvalidJoin, InvalidMove, ManagerError, SessionCoordinator};
pub use registry::{GameHandle, SessionRegistry};

//! Transport layer for tic-tac-toe sessions.
//!
//! Provides:
//! - Wire protocol (REST bodies, WebSocket messages)
//! - REST command routes (feature: http)
//! - WebSocket event listener adapter (feature: http)

pub mod protocol;

#[cfg(feature = "http")]
pub mod rest;

#[cfg(feature = "http")]
pub mod websocket;

pub use protocol::{ClientMessage, ControlMessage, ServerMessage};

#[cfg(feature = "http")]
pub use rest::create_api_router;

#[cfg(feature = "http")]
pub use websocket::create_ws_router;

/// REST commands plus the `/ws` event endpoint.
#[cfg(feature = "http")]
#[must_use]
pub fn create_router<U>(
    coordinator: std::sync::Arc<tictactoe_session::SessionCoordinator<U>>,
) -> axum::Router
where
    U: tictactoe_core::UserRepository + 'static,
{
    create_api_router(std::sync::Arc::clone(&coordinator)).merge(create_ws_router(coordinator))
}

//! Collaborator traits: identity lookup and event listeners.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::GameEvent;

/// Session identifier.
pub type SessionId = Uuid;

/// User identifier.
pub type UserId = Uuid;

/// Externally owned user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    #[serde(rename = "userId")]
    pub id: UserId,
    /// Display name.
    #[serde(rename = "userName")]
    pub name: String,
}

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt user store: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Trait for user identity backends.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Register a new user under a fresh id.
    async fn add_user(&self, name: &str) -> Result<User, StorageError>;

    /// Look a user up by id.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;
}

#[async_trait]
impl<T: UserRepository + ?Sized> UserRepository for std::sync::Arc<T> {
    async fn add_user(&self, name: &str) -> Result<User, StorageError> {
        (**self).add_user(name).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        (**self).get_user(id).await
    }
}

/// Listener delivery error.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listener's connection is gone; it will be dropped.
    #[error("Listener closed")]
    Closed,
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Receiver of events published on one session.
///
/// Each subscription gets its own delivery task, so a slow or failing
/// listener never holds up the session or the other listeners.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Handle one event. Events arrive in publish order.
    async fn on_event(&self, event: &GameEvent) -> Result<(), ListenerError>;

    /// True once the listener can no longer accept events.
    fn is_closed(&self) -> bool {
        false
    }
}

#[async_trait]
impl EventListener for mpsc::UnboundedSender<GameEvent> {
    async fn on_event(&self, event: &GameEvent) -> Result<(), ListenerError> {
        self.send(event.clone()).map_err(|_| ListenerError::Closed)
    }

    fn is_closed(&self) -> bool {
        mpsc::UnboundedSender::is_closed(self)
    }
}

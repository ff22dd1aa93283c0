//! In-memory user storage.

use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use tictactoe_core::{StorageError, User, UserId, UserRepository};
use uuid::Uuid;

/// In-memory user repository.
///
/// Useful for tests and throwaway servers.
/// Data is lost on restart.
pub struct MemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn add_user(&self, name: &str) -> Result<User, StorageError> {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };

        self.users
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .insert(user.id, user.clone());

        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .get(&id)
            .cloned())
    }
}

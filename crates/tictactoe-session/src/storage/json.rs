//! JSON file user storage.
//!
//! The file holds a pretty-printed array of `{"userId", "userName"}`
//! objects and is rewritten on every registration.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tictactoe_core::{StorageError, User, UserId, UserRepository};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// File-backed user repository.
#[derive(Debug)]
pub struct JsonUserRepository {
    path: PathBuf,
    // Held across the file write so concurrent registrations persist in order.
    users: Mutex<HashMap<UserId, User>>,
}

impl JsonUserRepository {
    /// Load users from `path`, creating an empty file if none exists.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or written, or does not
    /// contain a user array.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let users = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<User>>(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No user store, creating a new one");
                persist(&path, &[]).await?;
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), users = users.len(), "User store loaded");
        Ok(Self {
            path,
            users: Mutex::new(users.into_iter().map(|u| (u.id, u)).collect()),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn persist(path: &Path, users: &[&User]) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(users)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl UserRepository for JsonUserRepository {
    async fn add_user(&self, name: &str) -> Result<User, StorageError> {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };

        let mut users = self.users.lock().await;
        users.insert(user.id, user.clone());

        let mut all: Vec<&User> = users.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        if let Err(e) = persist(&self.path, &all).await {
            users.remove(&user.id);
            return Err(e);
        }

        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }
}

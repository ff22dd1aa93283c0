//! Registry of live sessions.

use std::{collections::HashMap, sync::Arc};

use tictactoe_core::{EventChannel, Session, SessionId, SessionSnapshot, SubscriptionId, Symbol};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;
use uuid::Uuid;

/// Mutable per-session state, guarded by one lock.
pub(crate) struct GameState {
    pub(crate) session: Session,
    /// Subscription currently occupying each symbol's listener slot.
    pub(crate) slots: HashMap<Symbol, SubscriptionId>,
}

/// A live session together with its event channel.
///
/// All mutations of one session go through `state`, so joins, the start
/// transition and moves are applied one at a time, and events are
/// published before the lock is released.
pub struct GameHandle {
    id: SessionId,
    state: Mutex<GameState>,
    channel: EventChannel,
}

impl GameHandle {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            state: Mutex::new(GameState {
                session: Session::new(id),
                slots: HashMap::new(),
            }),
            channel: EventChannel::new(id),
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The session's event channel.
    #[must_use]
    pub const fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Current state of the game.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.session.snapshot()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, GameState> {
        self.state.lock().await
    }
}

/// Owns every live session. Sessions are never removed.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<GameHandle>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session waiting for players.
    pub async fn create_session(&self) -> Arc<GameHandle> {
        let id = Uuid::new_v4();
        let handle = Arc::new(GameHandle::new(id));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::clone(&handle));
        info!(session = %id, live = sessions.len(), "session created");
        handle
    }

    /// Look up a session.
    pub async fn get(&self, id: SessionId) -> Option<Arc<GameHandle>> {
        self.sessions.read().await.get(&id).map(Arc::clone)
    }
}

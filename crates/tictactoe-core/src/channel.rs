//! Per-session ordered multicast of game events.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, PoisonError, RwLock},
};

use futures::stream::BoxStream;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    GameEvent,
    traits::{EventListener, ListenerError, SessionId},
};

/// Number of published events kept for inspection.
const HISTORY_LEN: usize = 256;

/// Subscription identifier.
pub type SubscriptionId = Uuid;

/// Returned by [`EventChannel::subscribe`]; pass back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub session_id: SessionId,
    pub id: SubscriptionId,
}

struct Subscriber {
    tx: mpsc::UnboundedSender<GameEvent>,
    task: JoinHandle<()>,
    listener: Arc<dyn EventListener>,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        !self.tx.is_closed() && !self.listener.is_closed()
    }
}

struct Inner {
    subscribers: HashMap<SubscriptionId, Subscriber>,
    history: VecDeque<GameEvent>,
}

/// Event channel for one session.
///
/// Every subscriber owns a queue and a delivery task, so `publish` never
/// waits on a listener. Events reach each listener in publish order;
/// listeners only see events published after they subscribed.
pub struct EventChannel {
    session_id: SessionId,
    inner: RwLock<Inner>,
}

impl EventChannel {
    /// Create an empty channel. Must be used inside a Tokio runtime.
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            inner: RwLock::new(Inner {
                subscribers: HashMap::new(),
                history: VecDeque::with_capacity(16),
            }),
        }
    }

    /// Register a listener for future events.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> SubscriptionHandle {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(deliver(self.session_id, id, rx, Arc::clone(&listener)));

        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .insert(id, Subscriber { tx, task, listener });

        debug!(session = %self.session_id, subscription = %id, "listener subscribed");
        SubscriptionHandle {
            session_id: self.session_id,
            id,
        }
    }

    /// Remove a listener. Events still queued for it are discarded.
    ///
    /// Returns `false` if the handle was unknown or already removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .remove(&handle.id);

        let Some(sub) = removed else {
            return false;
        };
        sub.task.abort();
        debug!(session = %self.session_id, subscription = %handle.id, "listener unsubscribed");
        true
    }

    /// Queue `event` for every current subscriber and record it in history.
    pub fn publish(&self, event: GameEvent) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        // Subscribers whose delivery task has stopped are dropped here.
        inner
            .subscribers
            .retain(|_, sub| sub.tx.send(event.clone()).is_ok());

        debug!(
            session = %self.session_id,
            event = event.kind(),
            listeners = inner.subscribers.len(),
            "event published"
        );

        if inner.history.len() == HISTORY_LEN {
            inner.history.pop_front();
        }
        inner.history.push_back(event);
    }

    /// True while the subscription exists and its listener still accepts
    /// events. A closed listener is only pruned on the next publish, so this
    /// may report `false` for a subscription that is still registered.
    #[must_use]
    pub fn is_live(&self, id: SubscriptionId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .get(&id)
            .is_some_and(Subscriber::is_live)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    /// Recently published events, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<GameEvent> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .cloned()
            .collect()
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, sub) in inner.subscribers.drain() {
            sub.task.abort();
        }
    }
}

async fn deliver(
    session_id: SessionId,
    subscription: SubscriptionId,
    mut rx: mpsc::UnboundedReceiver<GameEvent>,
    listener: Arc<dyn EventListener>,
) {
    while let Some(event) = rx.recv().await {
        match listener.on_event(&event).await {
            Ok(()) => {}
            Err(ListenerError::Closed) => {
                debug!(session = %session_id, %subscription, "listener closed, stopping delivery");
                break;
            }
            Err(e) => {
                warn!(
                    session = %session_id,
                    %subscription,
                    event = event.kind(),
                    "delivery failed: {e}"
                );
            }
        }
    }
}

/// A listener paired with the stream of events it receives.
///
/// Convenient for adapters that prefer pulling events over implementing
/// [`EventListener`].
#[must_use]
pub fn listener_stream() -> (Arc<dyn EventListener>, BoxStream<'static, GameEvent>) {
    let (tx, rx) = mpsc::unbounded_channel::<GameEvent>();
    (Arc::new(tx), Box::pin(UnboundedReceiverStream::new(rx)))
}

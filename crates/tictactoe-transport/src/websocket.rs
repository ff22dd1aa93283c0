//! WebSocket transport: forwards a session's events to a browser.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tictactoe_core::{EventListener, GameEvent, ListenerError, SubscriptionHandle, UserRepository};
use tictactoe_session::SessionCoordinator;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::protocol::{ClientMessage, ControlMessage, ServerMessage};

/// Event listener backed by one WebSocket connection's outbound queue.
pub struct WsListener {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl WsListener {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventListener for WsListener {
    async fn on_event(&self, event: &GameEvent) -> Result<(), ListenerError> {
        self.tx
            .send(ServerMessage::Event(event.clone()))
            .map_err(|_| ListenerError::Closed)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Per-connection state: at most one subscription at a time.
pub struct Connection<U>
where
    U: UserRepository,
{
    coordinator: Arc<SessionCoordinator<U>>,
    tx: mpsc::UnboundedSender<ServerMessage>,
    subscription: Option<SubscriptionHandle>,
}

impl<U> Connection<U>
where
    U: UserRepository,
{
    #[must_use]
    pub const fn new(
        coordinator: Arc<SessionCoordinator<U>>,
        tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            coordinator,
            tx,
            subscription: None,
        }
    }

    /// Apply one client message.
    pub async fn handle(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::Ping => self.reply(ControlMessage::Pong),
            ClientMessage::Subscribe { game_id, user_id } => {
                self.detach().await;
                let listener = Arc::new(WsListener::new(self.tx.clone()));
                match self
                    .coordinator
                    .attach_listener(game_id, user_id, listener)
                    .await
                {
                    Ok(handle) => {
                        self.subscription = Some(handle);
                        self.reply(ControlMessage::Subscribed { game_id });
                    }
                    Err(e) => {
                        warn!(game = %game_id, "Subscribe failed: {e}");
                        let _ = self.tx.send(ServerMessage::error(e));
                    }
                }
            }
            ClientMessage::Unsubscribe => {
                if self.detach().await {
                    self.reply(ControlMessage::Unsubscribed);
                } else {
                    let _ = self.tx.send(ServerMessage::error("Not subscribed"));
                }
            }
        }
    }

    /// Drop the connection's subscription, if any.
    pub async fn close(mut self) {
        self.detach().await;
    }

    async fn detach(&mut self) -> bool {
        let Some(handle) = self.subscription.take() else {
            return false;
        };
        match self.coordinator.detach_listener(handle).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Detach failed: {e}");
                false
            }
        }
    }

    fn reply(&self, msg: ControlMessage) {
        let _ = self.tx.send(ServerMessage::Control(msg));
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler<U>(
    ws: WebSocketUpgrade,
    State(coordinator): State<Arc<SessionCoordinator<U>>>,
) -> impl IntoResponse
where
    U: UserRepository + 'static,
{
    ws.on_upgrade(|socket| handle_socket(socket, coordinator))
}

async fn handle_socket<U>(socket: WebSocket, coordinator: Arc<SessionCoordinator<U>>)
where
    U: UserRepository + 'static,
{
    let (mut sender, mut receiver) = socket.split();

    // Channel for sending messages to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Spawn task to forward messages to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection::new(coordinator, tx.clone());

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s.into(),
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                error!("WebSocket error: {e}");
                break;
            }
        };

        let client_msg: ClientMessage = match serde_json::from_str(&msg) {
            Ok(m) => m,
            Err(e) => {
                warn!("Invalid client message: {e}");
                let _ = tx.send(ServerMessage::error(format!("Invalid message: {e}")));
                continue;
            }
        };

        connection.handle(client_msg).await;
    }

    connection.close().await;
    send_task.abort();
    debug!("WebSocket disconnected");
}

/// Create WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(coordinator));
/// ```
#[must_use]
pub fn create_ws_router<U>(coordinator: Arc<SessionCoordinator<U>>) -> axum::Router
where
    U: UserRepository + 'static,
{
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler::<U>))
        .with_state(coordinator)
}

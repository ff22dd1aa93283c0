//! Session coordinator: the entry point used by the transport layer.

use std::sync::Arc;

use tictactoe_core::{
    EventListener, GameEvent, JoinError, MoveError, MoveOutcome, SessionId, SessionSnapshot,
    StorageError, SubscriptionHandle, Symbol, User, UserId, UserRepository,
};
use tracing::{debug, info, warn};

use crate::registry::{GameHandle, SessionRegistry};

/// Join failure.
#[derive(Debug, thiserror::Error)]
pub enum InvalidJoin {
    #[error("Session not found: {0}")]
    UnknownSession(SessionId),
    #[error("User not found: {0}")]
    UnknownUser(UserId),
    #[error(transparent)]
    Rejected(#[from] JoinError),
}

/// Move failure.
#[derive(Debug, thiserror::Error)]
pub enum InvalidMove {
    #[error("Session not found: {0}")]
    UnknownSession(SessionId),
    #[error("User not found: {0}")]
    UnknownUser(UserId),
    #[error(transparent)]
    Rejected(#[from] MoveError),
}

/// Coordinator error.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Invalid join: {0}")]
    InvalidJoin(#[from] InvalidJoin),
    #[error("Invalid move: {0}")]
    InvalidMove(#[from] InvalidMove),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Session not found: {0}")]
    NotFound(SessionId),
}

/// Orchestrates the session registry, user lookups and event emission.
pub struct SessionCoordinator<U>
where
    U: UserRepository,
{
    users: U,
    registry: SessionRegistry,
}

impl<U> SessionCoordinator<U>
where
    U: UserRepository,
{
    /// Create a coordinator over an existing registry.
    #[must_use]
    pub const fn new(users: U, registry: SessionRegistry) -> Self {
        Self { users, registry }
    }

    /// The session registry.
    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register a new user.
    ///
    /// # Errors
    /// Returns error if the user repository fails.
    pub async fn register_user(&self, name: &str) -> Result<User, ManagerError> {
        let user = self.users.add_user(name).await?;
        info!(user = %user.id, name = %user.name, "user registered");
        Ok(user)
    }

    /// Create a new game and return its id.
    pub async fn create_game(&self) -> SessionId {
        self.registry.create_session().await.id()
    }

    /// Seat a user on a symbol.
    ///
    /// # Errors
    /// Returns `InvalidJoin` if the user or session is unknown or the
    /// session rejects the join.
    pub async fn join_game(
        &self,
        user_id: UserId,
        session_id: SessionId,
        symbol: Symbol,
    ) -> Result<(), ManagerError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(InvalidJoin::UnknownUser(user_id))?;
        let game = self
            .registry
            .get(session_id)
            .await
            .ok_or(InvalidJoin::UnknownSession(session_id))?;

        let mut state = game.lock().await;
        state.session.join(&user, symbol).map_err(|e| {
            warn!(session = %session_id, user = %user_id, %symbol, "join rejected: {e}");
            InvalidJoin::from(e)
        })?;

        info!(session = %session_id, user = %user_id, %symbol, "player joined");
        Ok(())
    }

    /// Validate and apply a move, then publish `new-move` and, if the game
    /// is over, `game-ended`.
    ///
    /// # Errors
    /// Returns `InvalidMove` if the user or session is unknown or the
    /// session rejects the move.
    pub async fn make_move(
        &self,
        user_id: UserId,
        session_id: SessionId,
        row: usize,
        col: usize,
        symbol: Symbol,
    ) -> Result<MoveOutcome, ManagerError> {
        if self.users.get_user(user_id).await?.is_none() {
            return Err(InvalidMove::UnknownUser(user_id).into());
        }
        let game = self
            .registry
            .get(session_id)
            .await
            .ok_or(InvalidMove::UnknownSession(session_id))?;

        let mut state = game.lock().await;
        let outcome = state
            .session
            .make_move(user_id, symbol, row, col)
            .map_err(|e| {
                warn!(
                    session = %session_id,
                    user = %user_id,
                    %symbol,
                    row,
                    col,
                    "move rejected: {e}"
                );
                InvalidMove::from(e)
            })?;

        // Published under the session lock so the next move's events
        // cannot overtake these.
        game.channel().publish(GameEvent::NewMove {
            x: outcome.row,
            y: outcome.col,
            symbol: outcome.symbol,
        });
        if let Some(result) = outcome.result {
            game.channel().publish(GameEvent::GameEnded(result));
        }

        Ok(outcome)
    }

    /// Subscribe a listener to a session's events.
    ///
    /// When `user_id` names a player of the session, the listener occupies
    /// that player's slot. The game starts when the second slot fills.
    ///
    /// # Errors
    /// Returns `NotFound` if the session does not exist.
    pub async fn attach_listener(
        &self,
        session_id: SessionId,
        user_id: Option<UserId>,
        listener: Arc<dyn EventListener>,
    ) -> Result<SubscriptionHandle, ManagerError> {
        let game = self.game(session_id).await?;

        let mut state = game.lock().await;
        let handle = game.channel().subscribe(listener);

        let Some(symbol) = user_id.and_then(|u| state.session.symbol_of(u)) else {
            debug!(session = %session_id, "observer attached");
            return Ok(handle);
        };

        // A slot held by a listener that has gone away is free again.
        state.slots.retain(|_, id| game.channel().is_live(*id));

        let before = state.slots.len();
        state.slots.insert(symbol, handle.id);
        debug!(
            session = %session_id,
            %symbol,
            slots = state.slots.len(),
            "player listener attached"
        );

        if before < Symbol::ALL.len() && state.slots.len() == Symbol::ALL.len() {
            match state.session.start() {
                Ok(()) => game.channel().publish(GameEvent::GameStarted),
                Err(e) => debug!(session = %session_id, "not starting: {e}"),
            }
        }

        Ok(handle)
    }

    /// Remove a listener and free any slot it occupied.
    ///
    /// Returns `false` if the subscription was already gone.
    ///
    /// # Errors
    /// Returns `NotFound` if the session does not exist.
    pub async fn detach_listener(&self, handle: SubscriptionHandle) -> Result<bool, ManagerError> {
        let game = self.game(handle.session_id).await?;

        let mut state = game.lock().await;
        state.slots.retain(|_, id| *id != handle.id);
        Ok(game.channel().unsubscribe(handle))
    }

    /// Current state of a session, if it exists.
    pub async fn snapshot(&self, session_id: SessionId) -> Option<SessionSnapshot> {
        let game = self.registry.get(session_id).await?;
        Some(game.snapshot().await)
    }

    async fn game(&self, session_id: SessionId) -> Result<Arc<GameHandle>, ManagerError> {
        self.registry
            .get(session_id)
            .await
            .ok_or(ManagerError::NotFound(session_id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{StreamExt, stream::BoxStream};
    use tictactoe_core::{
        BoardError, GameResult, SessionState, StartError, listener_stream,
    };
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    use super::*;
    use crate::storage::MemoryUserRepository;

    type Coordinator = SessionCoordinator<MemoryUserRepository>;

    fn coordinator() -> Arc<Coordinator> {
        Arc::new(SessionCoordinator::new(
            MemoryUserRepository::new(),
            SessionRegistry::new(),
        ))
    }

    async fn next(rx: &mut BoxStream<'static, GameEvent>) -> GameEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
    }

    async fn assert_quiet(rx: &mut BoxStream<'static, GameEvent>) {
        let res = tokio::time::timeout(Duration::from_millis(50), rx.next()).await;
        assert!(res.is_err(), "unexpected event: {res:?}");
    }

    struct Table {
        game: SessionId,
        alice: User,
        bob: User,
        alice_rx: BoxStream<'static, GameEvent>,
        bob_rx: BoxStream<'static, GameEvent>,
    }

    /// Alice holds Cross, Bob holds Circle, both listening.
    async fn started_table(c: &Coordinator) -> Table {
        let alice = assert_ok!(c.register_user("alice").await);
        let bob = assert_ok!(c.register_user("bob").await);
        let game = c.create_game().await;
        assert_ok!(c.join_game(alice.id, game, Symbol::Cross).await);
        assert_ok!(c.join_game(bob.id, game, Symbol::Circle).await);

        let (a, mut alice_rx) = listener_stream();
        let (b, mut bob_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(alice.id), a).await);
        assert_ok!(c.attach_listener(game, Some(bob.id), b).await);

        assert_eq!(next(&mut alice_rx).await, GameEvent::GameStarted);
        assert_eq!(next(&mut bob_rx).await, GameEvent::GameStarted);

        Table {
            game,
            alice,
            bob,
            alice_rx,
            bob_rx,
        }
    }

    fn new_move(x: usize, y: usize, symbol: Symbol) -> GameEvent {
        GameEvent::NewMove { x, y, symbol }
    }

    #[tokio::test]
    async fn test_full_game_scenario() {
        let c = coordinator();
        let mut t = started_table(&c).await;
        assert_eq!(
            c.snapshot(t.game).await.unwrap().state,
            SessionState::InProgress
        );

        let moves = [
            (t.alice.id, Symbol::Cross, 0, 0),
            (t.bob.id, Symbol::Circle, 0, 1),
            (t.alice.id, Symbol::Cross, 1, 1),
            (t.bob.id, Symbol::Circle, 0, 2),
            (t.alice.id, Symbol::Cross, 2, 2),
        ];
        for (user, symbol, row, col) in moves {
            assert_ok!(c.make_move(user, t.game, row, col, symbol).await);
        }

        for rx in [&mut t.alice_rx, &mut t.bob_rx] {
            for (_, symbol, row, col) in moves {
                assert_eq!(next(rx).await, new_move(row, col, symbol));
            }
            assert_eq!(
                next(rx).await,
                GameEvent::GameEnded(GameResult::Winner(Symbol::Cross))
            );
        }

        let err = assert_err!(c.make_move(t.bob.id, t.game, 2, 0, Symbol::Circle).await);
        assert!(matches!(
            err,
            ManagerError::InvalidMove(InvalidMove::Rejected(MoveError::GameNotInProgress(
                SessionState::Ended
            )))
        ));
        assert_quiet(&mut t.alice_rx).await;
    }

    #[tokio::test]
    async fn test_first_move_turns_to_circle() {
        let c = coordinator();
        let mut t = started_table(&c).await;

        let outcome = assert_ok!(c.make_move(t.alice.id, t.game, 1, 1, Symbol::Cross).await);
        assert_eq!(outcome.result, None);
        assert_eq!(next(&mut t.bob_rx).await, new_move(1, 1, Symbol::Cross));
        assert_eq!(c.snapshot(t.game).await.unwrap().turn, Symbol::Circle);
    }

    #[tokio::test]
    async fn test_rejected_moves_publish_nothing() {
        let c = coordinator();
        let mut t = started_table(&c).await;

        let cases = [
            (t.bob.id, Symbol::Circle, 0, 0),
            (t.bob.id, Symbol::Cross, 0, 0),
            (t.alice.id, Symbol::Cross, 0, 3),
        ];
        for (user, symbol, row, col) in cases {
            let err = assert_err!(c.make_move(user, t.game, row, col, symbol).await);
            assert!(matches!(err, ManagerError::InvalidMove(InvalidMove::Rejected(_))));
        }

        assert_ok!(c.make_move(t.alice.id, t.game, 0, 0, Symbol::Cross).await);
        let err = assert_err!(c.make_move(t.bob.id, t.game, 0, 0, Symbol::Circle).await);
        assert!(matches!(
            err,
            ManagerError::InvalidMove(InvalidMove::Rejected(MoveError::Board(
                BoardError::CellOccupied { row: 0, col: 0 }
            )))
        ));

        assert_eq!(next(&mut t.alice_rx).await, new_move(0, 0, Symbol::Cross));
        assert_quiet(&mut t.alice_rx).await;
    }

    #[tokio::test]
    async fn test_unknown_session_and_user() {
        let c = coordinator();
        let alice = assert_ok!(c.register_user("alice").await);
        let game = c.create_game().await;

        let err = assert_err!(c.join_game(alice.id, Uuid::new_v4(), Symbol::Cross).await);
        assert!(matches!(err, ManagerError::InvalidJoin(InvalidJoin::UnknownSession(_))));

        let err = assert_err!(c.join_game(Uuid::new_v4(), game, Symbol::Cross).await);
        assert!(matches!(err, ManagerError::InvalidJoin(InvalidJoin::UnknownUser(_))));

        let err = assert_err!(c.make_move(alice.id, Uuid::new_v4(), 0, 0, Symbol::Cross).await);
        assert!(matches!(err, ManagerError::InvalidMove(InvalidMove::UnknownSession(_))));

        let err = assert_err!(c.make_move(Uuid::new_v4(), game, 0, 0, Symbol::Cross).await);
        assert!(matches!(err, ManagerError::InvalidMove(InvalidMove::UnknownUser(_))));

        let (listener, _rx) = listener_stream();
        let err = assert_err!(c.attach_listener(Uuid::new_v4(), None, listener).await);
        assert!(matches!(err, ManagerError::NotFound(_)));

        assert!(c.snapshot(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_join_rejections() {
        let c = coordinator();
        let alice = assert_ok!(c.register_user("alice").await);
        let bob = assert_ok!(c.register_user("bob").await);
        let game = c.create_game().await;

        assert_ok!(c.join_game(alice.id, game, Symbol::Cross).await);
        let err = assert_err!(c.join_game(bob.id, game, Symbol::Cross).await);
        assert!(matches!(
            err,
            ManagerError::InvalidJoin(InvalidJoin::Rejected(JoinError::SymbolTaken(Symbol::Cross)))
        ));
        let err = assert_err!(c.join_game(alice.id, game, Symbol::Circle).await);
        assert!(matches!(
            err,
            ManagerError::InvalidJoin(InvalidJoin::Rejected(JoinError::UserAlreadyJoined(_)))
        ));
        assert_ok!(c.join_game(bob.id, game, Symbol::Circle).await);
    }

    #[tokio::test]
    async fn test_start_needs_both_player_slots() {
        let c = coordinator();
        let alice = assert_ok!(c.register_user("alice").await);
        let bob = assert_ok!(c.register_user("bob").await);
        let game = c.create_game().await;
        assert_ok!(c.join_game(alice.id, game, Symbol::Cross).await);

        // Alice attaching twice before Bob joins must not start anything.
        let (a1, _a1_rx) = listener_stream();
        let (a2, mut a2_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(alice.id), a1).await);
        assert_ok!(c.attach_listener(game, Some(alice.id), a2).await);

        // Observers and listeners of non-players occupy no slot.
        let (o, mut observer_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, None, o).await);
        let (stranger, _s_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(bob.id), stranger).await);

        assert_ok!(c.join_game(bob.id, game, Symbol::Circle).await);
        assert_eq!(c.snapshot(game).await.unwrap().state, SessionState::WaitingPlayers);
        assert_quiet(&mut a2_rx).await;

        let (b, mut bob_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(bob.id), b).await);

        assert_eq!(c.snapshot(game).await.unwrap().state, SessionState::InProgress);
        for rx in [&mut a2_rx, &mut bob_rx, &mut observer_rx] {
            assert_eq!(next(rx).await, GameEvent::GameStarted);
        }

        // A further attach does not restart the game.
        let (b2, _b2_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(bob.id), b2).await);
        assert_quiet(&mut bob_rx).await;
    }

    #[tokio::test]
    async fn test_detach_frees_slot() {
        let c = coordinator();
        let alice = assert_ok!(c.register_user("alice").await);
        let bob = assert_ok!(c.register_user("bob").await);
        let game = c.create_game().await;
        assert_ok!(c.join_game(alice.id, game, Symbol::Cross).await);
        assert_ok!(c.join_game(bob.id, game, Symbol::Circle).await);

        let (a, _a_rx) = listener_stream();
        let handle = assert_ok!(c.attach_listener(game, Some(alice.id), a).await);
        assert!(assert_ok!(c.detach_listener(handle).await));
        assert!(!assert_ok!(c.detach_listener(handle).await));

        let (b, mut bob_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(bob.id), b).await);
        assert_eq!(c.snapshot(game).await.unwrap().state, SessionState::WaitingPlayers);
        assert_quiet(&mut bob_rx).await;

        let (a, _a_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(alice.id), a).await);
        assert_eq!(next(&mut bob_rx).await, GameEvent::GameStarted);
    }

    #[tokio::test]
    async fn test_closed_listener_does_not_hold_slot() {
        let c = coordinator();
        let alice = assert_ok!(c.register_user("alice").await);
        let bob = assert_ok!(c.register_user("bob").await);
        let game = c.create_game().await;
        assert_ok!(c.join_game(alice.id, game, Symbol::Cross).await);
        assert_ok!(c.join_game(bob.id, game, Symbol::Circle).await);

        // Alice's stream goes away without a detach.
        let (a, a_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(alice.id), a).await);
        drop(a_rx);

        let (b, mut bob_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(bob.id), b).await);
        assert_eq!(c.snapshot(game).await.unwrap().state, SessionState::WaitingPlayers);
        assert_quiet(&mut bob_rx).await;

        let (a, mut alice_rx) = listener_stream();
        assert_ok!(c.attach_listener(game, Some(alice.id), a).await);
        assert_eq!(next(&mut alice_rx).await, GameEvent::GameStarted);
        assert_eq!(next(&mut bob_rx).await, GameEvent::GameStarted);
    }

    #[tokio::test]
    async fn test_start_error_is_not_ready_before_players() {
        let c = coordinator();
        let game = c.create_game().await;
        let handle = c.registry().get(game).await.unwrap();
        let err = handle.lock().await.session.start();
        assert!(matches!(err, Err(StartError::NotReady { players: 0, .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_moves_accept_one_per_turn() {
        let c = coordinator();
        let mut t = started_table(&c).await;

        // Both players race for every cell; alternation must still hold.
        let mut tasks = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                for (user, symbol) in [(t.alice.id, Symbol::Cross), (t.bob.id, Symbol::Circle)] {
                    let c = Arc::clone(&c);
                    let game = t.game;
                    tasks.push(tokio::spawn(async move {
                        c.make_move(user, game, row, col, symbol).await.is_ok()
                    }));
                }
            }
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() {
                accepted += 1;
            }
        }

        let snapshot = c.snapshot(t.game).await.unwrap();
        let placed = snapshot.board.cells().iter().flatten().filter(|cell| cell.is_some()).count();
        assert_eq!(accepted, placed);

        // Events mirror the accepted moves and alternate from Cross.
        let mut expected = Symbol::Cross;
        for _ in 0..accepted {
            match next(&mut t.alice_rx).await {
                GameEvent::NewMove { symbol, .. } => assert_eq!(symbol, expected),
                other => panic!("unexpected event {other:?}"),
            }
            expected = expected.opponent();
        }
        assert_eq!(snapshot.turn, expected);
    }
}

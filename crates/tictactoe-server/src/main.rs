//! Tic-tac-toe game server.
//!
//! Serves the REST command API, the `/ws` event stream and the static
//! browser client under `/public`.

mod config;

use std::sync::Arc;

use anyhow::{Context, Error};
use tictactoe_core::UserRepository;
use tictactoe_session::{
    SessionCoordinator, SessionRegistry,
    storage::{JsonUserRepository, MemoryUserRepository},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Command, HELP, ServerConfig, UserStore};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let config = match ServerConfig::from_env()? {
        Command::Help => {
            print!("{HELP}");
            return Ok(());
        }
        Command::Run(config) => config,
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let users: Arc<dyn UserRepository> = match &config.users {
        UserStore::Memory => {
            info!("Using in-memory user store");
            Arc::new(MemoryUserRepository::new())
        }
        UserStore::Json(path) => {
            info!("Using user file {}", path.display());
            Arc::new(
                JsonUserRepository::open(path.clone())
                    .await
                    .with_context(|| format!("Failed to open user file {}", path.display()))?,
            )
        }
    };

    let coordinator = Arc::new(SessionCoordinator::new(users, SessionRegistry::new()));

    let app = tictactoe_transport::create_router(coordinator)
        .nest_service("/public", ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Server listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

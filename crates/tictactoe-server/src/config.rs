//! Server configuration.
//!
//! Each setting comes from a command-line flag, then an environment
//! variable, then a built-in default.

use std::{ffi::OsString, net::SocketAddr, path::PathBuf};

use pico_args::Arguments;

pub const HELP: &str = "\
Run a tic-tac-toe game server

USAGE:
  tictactoe-server [OPTIONS]

OPTIONS:
  --bind        IP:PORT   Server socket bind address  [default: env TTT_BIND or 127.0.0.1:8080]
  --users-db    PATH      JSON user file, or :memory:  [default: env TTT_USERS_DB or users.json]
  --static-dir  PATH      Directory served at /public  [default: env TTT_STATIC_DIR or public]

FLAGS:
  -h, --help              Print help information

ENVIRONMENT:
  TTT_BIND                Server bind address (e.g., 0.0.0.0:8080)
  TTT_USERS_DB            User store location
  TTT_STATIC_DIR          Static asset directory
  RUST_LOG                Log filter (default: info)
";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_USERS_DB: &str = "users.json";
const DEFAULT_STATIC_DIR: &str = "public";
const MEMORY_STORE: &str = ":memory:";

/// Where registered users are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserStore {
    Memory,
    Json(PathBuf),
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub users: UserStore,
    pub static_dir: PathBuf,
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },

    #[error("Invalid arguments: {0}")]
    Args(#[from] pico_args::Error),

    #[error("Unexpected arguments: {0:?}")]
    Unexpected(Vec<OsString>),
}

/// Outcome of argument parsing.
#[derive(Debug)]
pub enum Command {
    Help,
    Run(ServerConfig),
}

impl ServerConfig {
    /// Load configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns error if a flag or variable holds an invalid value.
    pub fn from_env() -> Result<Command, ConfigError> {
        Self::parse(Arguments::from_env(), |key| std::env::var(key).ok())
    }

    /// Load configuration from explicit arguments and a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns error if a flag or variable holds an invalid value.
    pub fn parse<F>(mut args: Arguments, env: F) -> Result<Command, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Help has a higher priority and should be handled separately.
        if args.contains(["-h", "--help"]) {
            return Ok(Command::Help);
        }

        let bind: Option<String> = args.opt_value_from_str("--bind")?;
        let users_db: Option<String> = args.opt_value_from_str("--users-db")?;
        let static_dir: Option<String> = args.opt_value_from_str("--static-dir")?;

        let rest = args.finish();
        if !rest.is_empty() {
            return Err(ConfigError::Unexpected(rest));
        }

        let (bind_var, bind) = pick(bind, "--bind", "TTT_BIND", DEFAULT_BIND, &env);
        let bind = bind.parse().map_err(|e| ConfigError::Invalid {
            var: bind_var.to_string(),
            reason: format!("{bind:?} is not an IP:PORT address ({e})"),
        })?;

        let (users_var, users_db) =
            pick(users_db, "--users-db", "TTT_USERS_DB", DEFAULT_USERS_DB, &env);
        let users = match users_db.trim() {
            "" => {
                return Err(ConfigError::Invalid {
                    var: users_var.to_string(),
                    reason: "Must not be empty".to_string(),
                });
            }
            MEMORY_STORE => UserStore::Memory,
            path => UserStore::Json(PathBuf::from(path)),
        };

        let (_, static_dir) = pick(
            static_dir,
            "--static-dir",
            "TTT_STATIC_DIR",
            DEFAULT_STATIC_DIR,
            &env,
        );

        Ok(Command::Run(Self {
            bind,
            users,
            static_dir: PathBuf::from(static_dir),
        }))
    }
}

/// Resolve one setting, returning the name of the source it came from.
fn pick<'a, F>(
    flag_value: Option<String>,
    flag: &'a str,
    var: &'a str,
    default: &str,
    env: &F,
) -> (&'a str, String)
where
    F: Fn(&str) -> Option<String>,
{
    match flag_value {
        Some(v) => (flag, v),
        None => env(var).map_or_else(|| (var, default.to_string()), |v| (var, v)),
    }
}

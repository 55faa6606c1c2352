use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Game,
    GameOption,
    Vote,
    User,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Game => "game",
            RecordKind::GameOption => "game option",
            RecordKind::Vote => "vote",
            RecordKind::User => "user",
        };
        f.write_str(name)
    }
}

/// Why a game's options could not be split into winners and losers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("game has no options")]
    NoOptions,

    #[error("majority game has no winning option")]
    NoWinner,

    #[error("winning pool of {win_pool} cannot pay out a losing pool of {lose_pool}")]
    UnpayablePool { win_pool: u64, lose_pool: u64 },

    #[error("staked totals overflow")]
    StakeOverflow,
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: String },

    #[error("cannot settle game {game_id}: {reason}")]
    Classification {
        game_id: String,
        reason: ClassificationError,
    },

    #[error("user {user_id} cannot absorb a change of {delta} with a balance of {balance}")]
    InsufficientFunds {
        user_id: String,
        balance: u64,
        delta: i64,
    },

    #[error("storage error: {0}")]
    Storage(#[from] surrealdb::Error),

    #[error("settlement of game {game_id} did not finish within {timeout:?}")]
    DeadlineExceeded { game_id: String, timeout: Duration },

    #[error("{0} is no longer running")]
    ManagerClosed(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

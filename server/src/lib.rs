pub mod config;
pub mod connection_manager;
pub mod database;
pub mod database_manager;
pub mod error;
pub mod game_manager;
pub mod notify;
pub mod outcome;
pub mod payout;
pub mod progression;
pub mod scheduler;
pub mod settlement;

pub use error::{Error, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod network;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    /// The option holding the largest pooled stake wins.
    Majority,
    /// The option holding the smallest non-zero pooled stake wins.
    Minority,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct User {
    pub id: String,
    pub fb_id: String,
    pub name: String,
    pub picture_url: String,
    pub money_total: u64,
    pub experience: u64,
    pub games_played: u32,
    pub games_won: u32,
    pub win_rate: f64,
}

impl User {
    // New players start with 100 coins and a clean record
    pub fn new(id: impl Into<String>, fb_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fb_id: fb_id.into(),
            name: name.into(),
            picture_url: String::new(),
            money_total: 100,
            experience: 0,
            games_played: 0,
            games_won: 0,
            win_rate: 0.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Game {
    pub id: String,
    pub owner_id: String,
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub game_mode: GameMode,
    pub stakes: String,
    pub resolved: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct GameOption {
    pub id: String,
    pub game_id: String,
    pub text: String,
    pub resolved: bool,
    pub winner: bool,
    pub total_value: u64,
    pub total_votes: u32,
}

impl GameOption {
    pub fn new(id: impl Into<String>, game_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            game_id: game_id.into(),
            text: text.into(),
            resolved: false,
            winner: false,
            total_value: 0,
            total_votes: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Vote {
    pub id: String,
    pub game_id: String,
    pub option_id: String,
    pub user_id: String,
    pub money: u64,
    pub resolved: bool,
    pub win: bool,
    pub change: i64,
}

impl Vote {
    pub fn new(
        id: impl Into<String>,
        game_id: impl Into<String>,
        option_id: impl Into<String>,
        user_id: impl Into<String>,
        money: u64,
    ) -> Self {
        Self {
            id: id.into(),
            game_id: game_id.into(),
            option_id: option_id.into(),
            user_id: user_id.into(),
            money,
            resolved: false,
            win: false,
            change: 0,
        }
    }
}

/// Where a player stands on the experience ladder.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub struct LevelInfo {
    pub level: u32,
    pub progress_to_next: u64,
    /// `None` once the final level has been reached.
    pub next_milestone: Option<u64>,
}

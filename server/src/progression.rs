//! Balances, win/loss records and the experience ladder.

use common::{LevelInfo, User};

use crate::error::{Error, Result};

/// Experience needed to clear each level, starting from level 1.
pub const EXP_REQUIRED: [u64; 9] = [10, 20, 50, 100, 250, 500, 800, 1250, 2000];

pub const HOST_EXP: u64 = 10;
pub const VOTE_EXP: u64 = 5;
pub const WIN_EXP: u64 = 10;

pub const LEADERBOARD_MIN_GAMES: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpEvent {
    Host,
    Vote,
    Win,
}

impl ExpEvent {
    pub fn amount(self) -> u64 {
        match self {
            ExpEvent::Host => HOST_EXP,
            ExpEvent::Vote => VOTE_EXP,
            ExpEvent::Win => WIN_EXP,
        }
    }
}

/// Applies a signed change to the user's balance. The balance is left
/// untouched if it would go negative.
pub fn allocate_money(user: &mut User, delta: i64) -> Result<()> {
    let balance = user
        .money_total
        .checked_add_signed(delta)
        .ok_or_else(|| Error::InsufficientFunds {
            user_id: user.id.clone(),
            balance: user.money_total,
            delta,
        })?;
    user.money_total = balance;
    Ok(())
}

pub fn allocate_exp(user: &mut User, event: ExpEvent) {
    user.experience = user.experience.saturating_add(event.amount());
}

pub fn allocate_win_or_loss(user: &mut User, win: bool) {
    user.games_played += 1;
    if win {
        user.games_won += 1;
    }
    user.win_rate = win_rate(user.games_won, user.games_played);
}

pub fn win_rate(games_won: u32, games_played: u32) -> f64 {
    if games_played == 0 {
        return 0.0;
    }
    f64::from(games_won) / f64::from(games_played)
}

/// Walks the ladder, spending experience on each threshold in turn.
///
/// Past the last threshold the level is capped with no further milestone.
pub fn level_info(exp: u64) -> LevelInfo {
    let mut remaining = exp;
    let mut level = 1;
    for required in EXP_REQUIRED {
        if remaining < required {
            return LevelInfo {
                level,
                progress_to_next: remaining,
                next_milestone: Some(required),
            };
        }
        remaining -= required;
        level += 1;
    }
    LevelInfo {
        level,
        progress_to_next: 0,
        next_milestone: None,
    }
}

pub fn level(exp: u64) -> u32 {
    level_info(exp).level
}

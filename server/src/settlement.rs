//! Works out everything a game's settlement changes, before anything is
//! written.

use std::collections::{BTreeMap, HashSet};

use common::{Game, GameOption, User, Vote};

use crate::error::{ClassificationError, Error, RecordKind, Result};
use crate::outcome::classify;
use crate::payout::{loss_change, settle_payout, win_change};
use crate::progression::{allocate_exp, allocate_money, allocate_win_or_loss, ExpEvent};

/// A message for one participant, sent once the settlement is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementSummary {
    pub game_id: String,
    pub winning_options: Vec<String>,
    pub win_pool: u64,
    pub lose_pool: u64,
    pub votes_settled: usize,
}

/// What a settlement adds to one player's standing. It is applied to the
/// stored user at commit time, never to a copy read while planning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandingChange {
    pub user_id: String,
    /// Payouts owed to the player; stakes were escrowed when voting.
    pub credit: i64,
    pub wins: u32,
    pub losses: u32,
}

impl StandingChange {
    pub fn apply(&self, user: &mut User) -> Result<()> {
        allocate_money(user, self.credit)?;
        for _ in 0..self.wins {
            allocate_exp(user, ExpEvent::Win);
            allocate_win_or_loss(user, true);
        }
        for _ in 0..self.losses {
            allocate_win_or_loss(user, false);
        }
        Ok(())
    }
}

/// The final state of every game record a settlement touches, plus the
/// relative changes to each voter.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub game: Game,
    pub options: Vec<GameOption>,
    pub votes: Vec<Vote>,
    pub standings: Vec<StandingChange>,
    pub notifications: Vec<Notification>,
    pub summary: SettlementSummary,
}

fn checked_total(amounts: impl IntoIterator<Item = u64>) -> Option<u64> {
    amounts
        .into_iter()
        .try_fold(0u64, |total, amount| total.checked_add(amount))
}

/// Classifies the game, pays every winning vote out of the losing pool and
/// records how each voter's standing changes.
///
/// `ballots` pairs each option with its votes; `voters` must hold every
/// voting user's id.
pub fn plan_settlement(
    mut game: Game,
    ballots: Vec<(GameOption, Vec<Vote>)>,
    voters: &HashSet<String>,
) -> Result<Settlement> {
    let overflow = |game_id: &str| Error::Classification {
        game_id: game_id.to_owned(),
        reason: ClassificationError::StakeOverflow,
    };

    let stakes = ballots
        .iter()
        .map(|(_, votes)| checked_total(votes.iter().map(|vote| vote.money)))
        .collect::<Option<Vec<u64>>>()
        .ok_or_else(|| overflow(&game.id))?;

    let outcome = classify(&stakes, game.game_mode).map_err(|reason| Error::Classification {
        game_id: game.id.clone(),
        reason,
    })?;

    let win_pool = checked_total(outcome.winners.iter().map(|&i| stakes[i]))
        .ok_or_else(|| overflow(&game.id))?;
    // promoted losers are the winners, nothing is staked against them
    let lose_pool = if outcome.promoted {
        0
    } else {
        checked_total(outcome.losers.iter().map(|&i| stakes[i])).ok_or_else(|| overflow(&game.id))?
    };
    let unpayable = || Error::Classification {
        game_id: game.id.clone(),
        reason: ClassificationError::UnpayablePool {
            win_pool,
            lose_pool,
        },
    };

    let mut options = Vec::with_capacity(ballots.len());
    let mut settled_votes = Vec::new();
    let mut standings: BTreeMap<String, StandingChange> = BTreeMap::new();
    let mut notifications = Vec::new();

    for (i, (mut option, votes)) in ballots.into_iter().enumerate() {
        option.resolved = true;
        option.winner = outcome.is_winner(i);
        option.total_value = stakes[i];
        option.total_votes = u32::try_from(votes.len()).unwrap_or(u32::MAX);
        let paid = outcome.winners.contains(&i);

        for mut vote in votes {
            if !voters.contains(&vote.user_id) {
                return Err(Error::not_found(RecordKind::User, &vote.user_id));
            }
            let standing = standings
                .entry(vote.user_id.clone())
                .or_insert_with(|| StandingChange {
                    user_id: vote.user_id.clone(),
                    ..StandingChange::default()
                });
            vote.resolved = true;

            if paid {
                let payout = settle_payout(vote.money, win_pool, lose_pool).ok_or_else(unpayable)?;
                // the stake was escrowed when the vote was cast
                let credit = i64::try_from(payout).map_err(|_| unpayable())?;
                standing.credit = standing.credit.checked_add(credit).ok_or_else(unpayable)?;
                standing.wins += 1;
                vote.win = true;
                vote.change = win_change(vote.money, payout);
                notifications.push(Notification {
                    user_id: vote.user_id.clone(),
                    message: format!("You have won {payout} from {}!!!", game.topic),
                });
            } else {
                standing.losses += 1;
                vote.win = false;
                vote.change = loss_change(vote.money);
                notifications.push(Notification {
                    user_id: vote.user_id.clone(),
                    message: format!("[Game Ended] {}", game.topic),
                });
            }
            settled_votes.push(vote);
        }
        options.push(option);
    }

    game.resolved = true;
    let summary = SettlementSummary {
        game_id: game.id.clone(),
        winning_options: options
            .iter()
            .filter(|option| option.winner)
            .map(|option| option.id.clone())
            .collect(),
        win_pool,
        lose_pool,
        votes_settled: settled_votes.len(),
    };

    Ok(Settlement {
        game,
        options,
        votes: settled_votes,
        standings: standings.into_values().collect(),
        notifications,
        summary,
    })
}

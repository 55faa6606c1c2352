use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::database_manager::{request, DatabaseRequest};
use crate::error::{Error, Result};
use crate::game_manager::{resolve, GameRequest, Resolution};

/// Submits games for settlement once their end time has passed.
pub struct GameCloser {
    database_requester: mpsc::Sender<DatabaseRequest>,
    game_requester: mpsc::Sender<GameRequest>,
    poll_interval: Duration,
    // games that can never be classified, kept out of later sweeps
    unsettleable: HashSet<String>,
}

impl GameCloser {
    pub fn new(
        database_requester: mpsc::Sender<DatabaseRequest>,
        game_requester: mpsc::Sender<GameRequest>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            database_requester,
            game_requester,
            poll_interval,
            unsettleable: HashSet::new(),
        }
    }

    pub async fn manage(&mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            match self.close_expired(Utc::now()).await {
                Ok(closed) if !closed.is_empty() => {
                    info!(count = closed.len(), "closed expired games");
                }
                Ok(_) => {}
                Err(Error::ManagerClosed(manager)) => {
                    warn!(manager, "stopping game closer");
                    return;
                }
                Err(error) => warn!(%error, "failed to look up expired games"),
            }
        }
    }

    /// Settles every unresolved game that ended at or before `now` and
    /// returns the ids of those that were settled.
    pub async fn close_expired(&mut self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let games = request(&self.database_requester, |responder| {
            DatabaseRequest::GetExpiredGames { now, responder }
        })
        .await?;

        let mut closed = Vec::new();
        for game in games {
            if self.unsettleable.contains(&game.id) {
                continue;
            }
            match resolve(&self.game_requester, &game.id).await {
                Ok(Resolution::Settled(_)) => closed.push(game.id),
                Ok(Resolution::AlreadyResolved) => {}
                Err(Error::Classification { game_id, reason }) => {
                    warn!(%game_id, %reason, "game cannot be settled, skipping it from now on");
                    self.unsettleable.insert(game_id);
                }
                Err(error @ Error::ManagerClosed(_)) => return Err(error),
                Err(error) => warn!(game_id = %game.id, %error, "failed to settle expired game"),
            }
        }
        Ok(closed)
    }
}

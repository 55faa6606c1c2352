use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use crate::database_manager::{request, DatabaseRequest, Responder};
use crate::error::{Error, RecordKind, Result};
use crate::notify::{AchievementVerifier, Notifier};
use crate::settlement::{plan_settlement, Notification, Settlement, SettlementSummary};

pub enum GameRequest {
    ResolveGame {
        game_id: String,
        responder: Responder<Resolution>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Settled(SettlementSummary),
    /// The game had been settled before; nothing was changed.
    AlreadyResolved,
}

/// Asks the game manager to settle a game and waits for the result.
pub async fn resolve(requester: &mpsc::Sender<GameRequest>, game_id: &str) -> Result<Resolution> {
    let (tx, rx) = oneshot::channel();
    requester
        .send(GameRequest::ResolveGame {
            game_id: game_id.to_owned(),
            responder: tx,
        })
        .await
        .map_err(|_| Error::ManagerClosed("game manager"))?;
    rx.await.map_err(|_| Error::ManagerClosed("game manager"))?
}

/// Settles games one request at a time, so a game can never be settled by
/// two requests at once.
pub struct GameManager {
    work_queue: mpsc::Receiver<GameRequest>,
    database_requester: mpsc::Sender<DatabaseRequest>,
    achievements: Arc<dyn AchievementVerifier>,
    notifier: Arc<dyn Notifier>,
    settlement_timeout: Duration,
}

//NOTE: No functions in this impl may crash
impl GameManager {
    pub fn new(
        work_queue: mpsc::Receiver<GameRequest>,
        database_requester: mpsc::Sender<DatabaseRequest>,
        achievements: Arc<dyn AchievementVerifier>,
        notifier: Arc<dyn Notifier>,
        settlement_timeout: Duration,
    ) -> Self {
        Self {
            work_queue,
            database_requester,
            achievements,
            notifier,
            settlement_timeout,
        }
    }

    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            match request {
                GameRequest::ResolveGame { game_id, responder } => {
                    // we do not care if the receiver has already disappeared
                    responder.send(self.resolve_game(&game_id).await).ok();
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn resolve_game(&self, game_id: &str) -> Result<Resolution> {
        let timeout = self.settlement_timeout;
        let planned = tokio::time::timeout(timeout, self.plan(game_id))
            .await
            .map_err(|_| Error::DeadlineExceeded {
                game_id: game_id.to_owned(),
                timeout,
            })??;

        let Some(mut settlement) = planned else {
            info!("game already resolved");
            return Ok(Resolution::AlreadyResolved);
        };
        debug!(votes = settlement.votes.len(), "settlement planned");

        let summary = settlement.summary.clone();
        let notifications = std::mem::take(&mut settlement.notifications);
        // the commit runs to completion outside the deadline
        request(&self.database_requester, |responder| {
            DatabaseRequest::ApplySettlement {
                settlement: Box::new(settlement),
                responder,
            }
        })
        .await?;

        info!(
            winners = ?summary.winning_options,
            win_pool = summary.win_pool,
            lose_pool = summary.lose_pool,
            votes = summary.votes_settled,
            "game settled"
        );
        self.dispatch(&notifications).await;
        Ok(Resolution::Settled(summary))
    }

    /// Loads the game and plans its settlement. Returns `None` when the game
    /// was already resolved.
    async fn plan(&self, game_id: &str) -> Result<Option<Settlement>> {
        let game = request(&self.database_requester, |responder| DatabaseRequest::GetGame {
            game_id: game_id.to_owned(),
            responder,
        })
        .await?
        .ok_or_else(|| Error::not_found(RecordKind::Game, game_id))?;
        if game.resolved {
            return Ok(None);
        }

        let options = request(&self.database_requester, |responder| {
            DatabaseRequest::GetGameOptions {
                game_id: game_id.to_owned(),
                responder,
            }
        })
        .await?;

        let mut ballots = Vec::with_capacity(options.len());
        for option in options {
            let votes = request(&self.database_requester, |responder| {
                DatabaseRequest::GetOptionVotes {
                    option_id: option.id.clone(),
                    responder,
                }
            })
            .await?;
            ballots.push((option, votes));
        }

        let mut voters = HashSet::new();
        for (_, votes) in &ballots {
            for vote in votes {
                if voters.contains(&vote.user_id) {
                    continue;
                }
                request(&self.database_requester, |responder| {
                    DatabaseRequest::GetUser {
                        user_id: vote.user_id.clone(),
                        responder,
                    }
                })
                .await?
                .ok_or_else(|| Error::not_found(RecordKind::User, &vote.user_id))?;
                voters.insert(vote.user_id.clone());
            }
        }

        plan_settlement(game, ballots, &voters).map(Some)
    }

    async fn dispatch(&self, notifications: &[Notification]) {
        for notification in notifications {
            let user_id = notification.user_id.as_str();
            if let Err(error) = self.achievements.verify_achievements(user_id).await {
                warn!(user_id, %error, "achievement check failed");
            }
            if let Err(error) = self
                .notifier
                .send_notification(&notification.message, user_id)
                .await
            {
                warn!(user_id, %error, "notification failed");
            }
        }
    }
}

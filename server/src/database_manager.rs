use chrono::{DateTime, Utc};
use common::{Game, GameOption, User, Vote};
use surrealdb::Connection;
use tokio::sync::{mpsc, oneshot};

use crate::database::DatabaseConnection;
use crate::error::{Error, Result};
use crate::progression::ExpEvent;
use crate::settlement::Settlement;

pub type Responder<T> = oneshot::Sender<Result<T>>;

pub enum DatabaseRequest {
    GetUser {
        user_id: String,
        responder: Responder<Option<User>>,
    },
    GetGame {
        game_id: String,
        responder: Responder<Option<Game>>,
    },
    GetGameOptions {
        game_id: String,
        responder: Responder<Vec<GameOption>>,
    },
    GetOptionVotes {
        option_id: String,
        responder: Responder<Vec<Vote>>,
    },
    GetExpiredGames {
        now: DateTime<Utc>,
        responder: Responder<Vec<Game>>,
    },
    GetLeaderboard {
        limit: u32,
        min_games: u32,
        responder: Responder<Vec<User>>,
    },
    AllocateMoney {
        user_id: String,
        delta: i64,
        responder: Responder<User>,
    },
    AllocateExp {
        user_id: String,
        event: ExpEvent,
        responder: Responder<User>,
    },
    ApplySettlement {
        settlement: Box<Settlement>,
        responder: Responder<()>,
    },
}

/// Sends a request to the database manager and waits for its answer.
pub async fn request<T>(
    requester: &mpsc::Sender<DatabaseRequest>,
    build: impl FnOnce(Responder<T>) -> DatabaseRequest,
) -> Result<T> {
    let (tx, rx) = oneshot::channel();
    requester
        .send(build(tx))
        .await
        .map_err(|_| Error::ManagerClosed("database manager"))?;
    rx.await
        .map_err(|_| Error::ManagerClosed("database manager"))?
}

/// Owns the storage connection and serves requests one at a time.
pub struct DatabaseManager<C: Connection> {
    db_connection: DatabaseConnection<C>,
    work_queue: mpsc::Receiver<DatabaseRequest>,
}

impl<C: Connection> DatabaseManager<C> {
    pub fn new(
        db_connection: DatabaseConnection<C>,
        work_queue: mpsc::Receiver<DatabaseRequest>,
    ) -> Self {
        Self {
            db_connection,
            work_queue,
        }
    }

    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            // the requester may have given up waiting, which is fine
            match request {
                DatabaseRequest::GetUser { user_id, responder } => {
                    let _ = responder.send(self.db_connection.get_user(&user_id).await);
                }
                DatabaseRequest::GetGame { game_id, responder } => {
                    let _ = responder.send(self.db_connection.get_game(&game_id).await);
                }
                DatabaseRequest::GetGameOptions { game_id, responder } => {
                    let _ = responder.send(self.db_connection.get_game_options(&game_id).await);
                }
                DatabaseRequest::GetOptionVotes {
                    option_id,
                    responder,
                } => {
                    let _ = responder.send(self.db_connection.get_option_votes(&option_id).await);
                }
                DatabaseRequest::GetExpiredGames { now, responder } => {
                    let _ = responder.send(self.db_connection.get_expired_games(now).await);
                }
                DatabaseRequest::GetLeaderboard {
                    limit,
                    min_games,
                    responder,
                } => {
                    let resp = self.db_connection.get_top_users(limit, min_games).await;
                    let _ = responder.send(resp);
                }
                DatabaseRequest::AllocateMoney {
                    user_id,
                    delta,
                    responder,
                } => {
                    let resp = self.db_connection.allocate_money(&user_id, delta).await;
                    let _ = responder.send(resp);
                }
                DatabaseRequest::AllocateExp {
                    user_id,
                    event,
                    responder,
                } => {
                    let resp = self.db_connection.allocate_exp(&user_id, event).await;
                    let _ = responder.send(resp);
                }
                DatabaseRequest::ApplySettlement {
                    settlement,
                    responder,
                } => {
                    let resp = self.db_connection.apply_settlement(&settlement).await;
                    let _ = responder.send(resp);
                }
            }
        }
    }
}

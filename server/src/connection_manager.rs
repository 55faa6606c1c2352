use common::network::{Connection, Packet, Request, Response};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::database_manager::{request, DatabaseRequest};
use crate::error::{Error, RecordKind};
use crate::game_manager::{resolve, GameRequest, Resolution};
use crate::progression::level_info;

/// Accepts admin connections until the listener fails.
pub async fn handle_listen_server(
    listener: TcpListener,
    db_tx: mpsc::Sender<DatabaseRequest>,
    game_tx: mpsc::Sender<GameRequest>,
    leaderboard_min_games: u32,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "failed to accept connection");
                continue;
            }
        };
        let db_tx = db_tx.clone();
        let game_tx = game_tx.clone();

        tokio::spawn(async move {
            let connection = match Connection::from_tcp_stream(stream).await {
                Ok(connection) => connection,
                Err(error) => {
                    debug!(%peer, %error, "websocket handshake failed");
                    return;
                }
            };
            if let Err(error) = handle_client(connection, db_tx, game_tx, leaderboard_min_games).await {
                debug!(%peer, %error, "connection dropped");
            }
        });
    }
}

async fn handle_client(
    mut connection: Connection<TcpStream>,
    db_tx: mpsc::Sender<DatabaseRequest>,
    game_tx: mpsc::Sender<GameRequest>,
    leaderboard_min_games: u32,
) -> anyhow::Result<()> {
    // a closed socket ends the session normally
    while let Some(packet) = connection.read().await? {
        let reply = match packet {
            Packet::RequestPacket(request) => {
                match handle_request(request, &db_tx, &game_tx, leaderboard_min_games).await {
                    Ok(response) => Packet::ResponsePacket(response),
                    Err(error) => Packet::Error(error.to_string()),
                }
            }
            other => Packet::Error(format!("incorrect packet type: {other:?}")),
        };
        connection.send(reply).await?;
    }
    Ok(())
}

async fn handle_request(
    req: Request,
    db_tx: &mpsc::Sender<DatabaseRequest>,
    game_tx: &mpsc::Sender<GameRequest>,
    leaderboard_min_games: u32,
) -> crate::Result<Response> {
    match req {
        Request::ResolveGame { game_id } => {
            let resolution = resolve(game_tx, &game_id).await?;
            Ok(Response::GameResolved {
                already_resolved: resolution == Resolution::AlreadyResolved,
                game_id,
            })
        }
        Request::LevelInfo { user_id } => {
            let user = request(db_tx, |responder| DatabaseRequest::GetUser {
                user_id: user_id.clone(),
                responder,
            })
            .await?
            .ok_or_else(|| Error::not_found(RecordKind::User, &user_id))?;
            Ok(Response::LevelInfo(level_info(user.experience)))
        }
        Request::Leaderboard { limit } => {
            let users = request(db_tx, |responder| DatabaseRequest::GetLeaderboard {
                limit,
                min_games: leaderboard_min_games,
                responder,
            })
            .await?;
            Ok(Response::Leaderboard(users))
        }
    }
}

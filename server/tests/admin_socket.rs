use std::sync::Arc;
use std::time::Duration;

use common::network::{Connection, Packet, Request, Response};
use common::{LevelInfo, User};
use server::config::DatabaseConfig;
use server::connection_manager::handle_listen_server;
use server::database::DatabaseConnection;
use server::database_manager::DatabaseManager;
use server::game_manager::GameManager;
use server::notify::{LogAchievements, LogNotifier};
use surrealdb::engine::local::Db;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::MaybeTlsStream;

async fn serve(db: DatabaseConnection<Db>) -> Connection<MaybeTlsStream<TcpStream>> {
    let (db_tx, db_rx) = mpsc::channel(32);
    let mut db_manager = DatabaseManager::new(db, db_rx);
    tokio::spawn(async move { db_manager.manage().await });

    let (game_tx, game_rx) = mpsc::channel(32);
    let mut game_manager = GameManager::new(
        game_rx,
        db_tx.clone(),
        Arc::new(LogAchievements),
        Arc::new(LogNotifier),
        Duration::from_secs(10),
    );
    tokio::spawn(async move { game_manager.manage().await });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(handle_listen_server(listener, db_tx, game_tx, 1));

    Connection::connect(&format!("ws://{address}")).await.unwrap()
}

async fn ask(connection: &mut Connection<MaybeTlsStream<TcpStream>>, request: Request) -> Packet {
    connection.send(Packet::RequestPacket(request)).await.unwrap();
    connection.read().await.unwrap().unwrap()
}

fn veteran(id: &str, games_played: u32, games_won: u32) -> User {
    let mut user = User::new(id, format!("fb-{id}"), id);
    user.games_played = games_played;
    user.games_won = games_won;
    user.win_rate = f64::from(games_won) / f64::from(games_played.max(1));
    user
}

#[tokio::test]
async fn level_info_reports_progress_towards_the_next_level() {
    let mut db = DatabaseConnection::in_memory(&DatabaseConfig::in_memory())
        .await
        .unwrap();
    let mut user = User::new("alice", "fb-alice", "Alice");
    user.experience = 15;
    db.add_user(&user).await.unwrap();
    let mut connection = serve(db).await;

    let reply = ask(
        &mut connection,
        Request::LevelInfo {
            user_id: "alice".into(),
        },
    )
    .await;
    assert_eq!(
        reply,
        Packet::ResponsePacket(Response::LevelInfo(LevelInfo {
            level: 2,
            progress_to_next: 5,
            next_milestone: Some(20),
        }))
    );
}

#[tokio::test]
async fn failed_requests_come_back_as_errors_and_keep_the_session_open() {
    let db = DatabaseConnection::in_memory(&DatabaseConfig::in_memory())
        .await
        .unwrap();
    let mut connection = serve(db).await;

    let reply = ask(
        &mut connection,
        Request::ResolveGame {
            game_id: "missing".into(),
        },
    )
    .await;
    let Packet::Error(message) = reply else {
        panic!("expected an error packet, got {reply:?}");
    };
    assert!(message.contains("missing"), "{message}");

    let reply = ask(
        &mut connection,
        Request::LevelInfo {
            user_id: "nobody".into(),
        },
    )
    .await;
    assert!(matches!(reply, Packet::Error(_)));

    connection
        .send(Packet::Error("not a request".into()))
        .await
        .unwrap();
    let reply = connection.read().await.unwrap().unwrap();
    assert!(matches!(reply, Packet::Error(_)));
}

#[tokio::test]
async fn leaderboard_ranks_experienced_players_by_win_rate() {
    let mut db = DatabaseConnection::in_memory(&DatabaseConfig::in_memory())
        .await
        .unwrap();
    for user in [
        veteran("steady", 10, 5),
        veteran("sharp", 4, 3),
        veteran("lucky", 1, 1),
        veteran("cold", 8, 1),
    ] {
        db.add_user(&user).await.unwrap();
    }
    let mut connection = serve(db).await;

    let reply = ask(&mut connection, Request::Leaderboard { limit: 2 }).await;
    let Packet::ResponsePacket(Response::Leaderboard(users)) = reply else {
        panic!("expected a leaderboard, got {reply:?}");
    };
    let ids: Vec<_> = users.iter().map(|user| user.id.as_str()).collect();
    assert_eq!(ids, ["sharp", "steady"]);
}

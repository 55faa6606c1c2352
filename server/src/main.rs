use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use server::config::Config;
use server::connection_manager::handle_listen_server;
use server::database::DatabaseConnection;
use server::database_manager::DatabaseManager;
use server::game_manager::GameManager;
use server::notify::{LogAchievements, LogNotifier};
use server::scheduler::GameCloser;
use surrealdb::Connection;
use tokio::join;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(about = "Settles ZeroSum games and serves the admin socket")]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::parse_toml("")?,
    };
    config.logging.init();

    if config.database.is_in_memory() {
        let database = DatabaseConnection::in_memory(&config.database).await?;
        run(database, config).await
    } else {
        let database = DatabaseConnection::connect(&config.database).await?;
        run(database, config).await
    }
}

async fn run<C: Connection>(database: DatabaseConnection<C>, config: Config) -> Result<()> {
    let (db_tx, db_rx) = mpsc::channel(32);
    let mut db_manager = DatabaseManager::new(database, db_rx);

    let db_task = tokio::spawn(async move {
        db_manager.manage().await;
    });

    let (game_tx, game_rx) = mpsc::channel(32);
    let mut game_manager = GameManager::new(
        game_rx,
        db_tx.clone(),
        Arc::new(LogAchievements),
        Arc::new(LogNotifier),
        config.settlement.timeout(),
    );

    let game_task = tokio::spawn(async move {
        game_manager.manage().await;
    });

    let mut closer = GameCloser::new(
        db_tx.clone(),
        game_tx.clone(),
        config.settlement.close_poll_interval(),
    );
    let closer_task = tokio::spawn(async move {
        closer.manage().await;
    });

    let listener = TcpListener::bind(&config.listen_address).await?;
    info!(address = %config.listen_address, "listening for admin connections");
    let min_games = config.settlement.leaderboard_min_games;
    let listen_server_task = tokio::spawn(async move {
        handle_listen_server(listener, db_tx, game_tx, min_games).await;
    });

    let (res1, res2, res3, res4) = join!(db_task, game_task, closer_task, listen_server_task);
    res1?;
    res2?;
    res3?;
    res4?;
    Ok(())
}

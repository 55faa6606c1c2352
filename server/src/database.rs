use chrono::{DateTime, Utc};
use common::{Game, GameMode, GameOption, User, Vote};
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::{Db, Mem};
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use surrealdb::sql::statements::{BeginStatement, CommitStatement};
use surrealdb::sql::Thing;
use surrealdb::{Connection, Surreal};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{Error, RecordKind, Result};
use crate::progression::{self, ExpEvent};
use crate::settlement::Settlement;

const USER: &str = "user";
const GAME: &str = "game";
const GAME_OPTION: &str = "game_option";
const VOTE: &str = "vote";

fn thing(table: &str, id: &str) -> Thing {
    Thing::from((table, id))
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Record {
    pub id: Thing,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbUser {
    pub id: Thing,
    pub fb_id: String,
    pub name: String,
    pub picture_url: String,
    pub money_total: u64,
    pub experience: u64,
    pub games_played: u32,
    pub games_won: u32,
    pub win_rate: f64,
}

impl From<&User> for DbUser {
    fn from(user: &User) -> Self {
        Self {
            id: thing(USER, &user.id),
            fb_id: user.fb_id.clone(),
            name: user.name.clone(),
            picture_url: user.picture_url.clone(),
            money_total: user.money_total,
            experience: user.experience,
            games_played: user.games_played,
            games_won: user.games_won,
            win_rate: user.win_rate,
        }
    }
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.id.to_raw(),
            fb_id: user.fb_id,
            name: user.name,
            picture_url: user.picture_url,
            money_total: user.money_total,
            experience: user.experience,
            games_played: user.games_played,
            games_won: user.games_won,
            win_rate: user.win_rate,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbGame {
    pub id: Thing,
    pub owner: Thing,
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub game_mode: GameMode,
    pub stakes: String,
    pub resolved: bool,
}

impl From<&Game> for DbGame {
    fn from(game: &Game) -> Self {
        Self {
            id: thing(GAME, &game.id),
            owner: thing(USER, &game.owner_id),
            topic: game.topic.clone(),
            start_time: game.start_time,
            end_time: game.end_time,
            game_mode: game.game_mode,
            stakes: game.stakes.clone(),
            resolved: game.resolved,
        }
    }
}

impl From<DbGame> for Game {
    fn from(game: DbGame) -> Self {
        Self {
            id: game.id.id.to_raw(),
            owner_id: game.owner.id.to_raw(),
            topic: game.topic,
            start_time: game.start_time,
            end_time: game.end_time,
            game_mode: game.game_mode,
            stakes: game.stakes,
            resolved: game.resolved,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbGameOption {
    pub id: Thing,
    pub game: Thing,
    pub text: String,
    pub resolved: bool,
    pub winner: bool,
    pub total_value: u64,
    pub total_votes: u32,
}

impl From<&GameOption> for DbGameOption {
    fn from(option: &GameOption) -> Self {
        Self {
            id: thing(GAME_OPTION, &option.id),
            game: thing(GAME, &option.game_id),
            text: option.text.clone(),
            resolved: option.resolved,
            winner: option.winner,
            total_value: option.total_value,
            total_votes: option.total_votes,
        }
    }
}

impl From<DbGameOption> for GameOption {
    fn from(option: DbGameOption) -> Self {
        Self {
            id: option.id.id.to_raw(),
            game_id: option.game.id.to_raw(),
            text: option.text,
            resolved: option.resolved,
            winner: option.winner,
            total_value: option.total_value,
            total_votes: option.total_votes,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbVote {
    pub id: Thing,
    pub game: Thing,
    pub game_option: Thing,
    pub user: Thing,
    pub money: u64,
    pub resolved: bool,
    pub win: bool,
    pub change: i64,
}

impl From<&Vote> for DbVote {
    fn from(vote: &Vote) -> Self {
        Self {
            id: thing(VOTE, &vote.id),
            game: thing(GAME, &vote.game_id),
            game_option: thing(GAME_OPTION, &vote.option_id),
            user: thing(USER, &vote.user_id),
            money: vote.money,
            resolved: vote.resolved,
            win: vote.win,
            change: vote.change,
        }
    }
}

impl From<DbVote> for Vote {
    fn from(vote: DbVote) -> Self {
        Self {
            id: vote.id.id.to_raw(),
            game_id: vote.game.id.to_raw(),
            option_id: vote.game_option.id.to_raw(),
            user_id: vote.user.id.to_raw(),
            money: vote.money,
            resolved: vote.resolved,
            win: vote.win,
            change: vote.change,
        }
    }
}

// The fields a settlement or a ledger operation may touch on each record.

#[derive(Serialize, Debug)]
struct UserStanding {
    money_total: u64,
    experience: u64,
    games_played: u32,
    games_won: u32,
    win_rate: f64,
}

impl From<&User> for UserStanding {
    fn from(user: &User) -> Self {
        Self {
            money_total: user.money_total,
            experience: user.experience,
            games_played: user.games_played,
            games_won: user.games_won,
            win_rate: user.win_rate,
        }
    }
}

#[derive(Serialize, Debug)]
struct OptionResult {
    resolved: bool,
    winner: bool,
    total_value: u64,
    total_votes: u32,
}

#[derive(Serialize, Debug)]
struct VoteResult {
    resolved: bool,
    win: bool,
    change: i64,
}

pub struct DatabaseConnection<C: Connection> {
    connection: Surreal<C>,
}

impl DatabaseConnection<Client> {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = Surreal::new::<Ws>(config.address.as_str()).await?;

        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await?;

        db.use_ns(&config.namespace).use_db(&config.database).await?;

        Ok(Self { connection: db })
    }
}

impl DatabaseConnection<Db> {
    pub async fn in_memory(config: &DatabaseConfig) -> Result<Self> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns(&config.namespace).use_db(&config.database).await?;
        Ok(Self { connection: db })
    }
}

impl<C: Connection> DatabaseConnection<C> {
    pub async fn add_user(&mut self, user: &User) -> Result<()> {
        let _: Option<Record> = self
            .connection
            .create((USER, user.id.as_str()))
            .content(DbUser::from(user))
            .await?;
        Ok(())
    }

    pub async fn add_game(&mut self, game: &Game) -> Result<()> {
        let _: Option<Record> = self
            .connection
            .create((GAME, game.id.as_str()))
            .content(DbGame::from(game))
            .await?;
        Ok(())
    }

    pub async fn add_game_option(&mut self, option: &GameOption) -> Result<()> {
        let _: Option<Record> = self
            .connection
            .create((GAME_OPTION, option.id.as_str()))
            .content(DbGameOption::from(option))
            .await?;
        Ok(())
    }

    pub async fn add_vote(&mut self, vote: &Vote) -> Result<()> {
        let _: Option<Record> = self
            .connection
            .create((VOTE, vote.id.as_str()))
            .content(DbVote::from(vote))
            .await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user: Option<DbUser> = self.connection.select((USER, user_id)).await?;
        Ok(user.map(Into::into))
    }

    pub async fn get_game(&self, game_id: &str) -> Result<Option<Game>> {
        let game: Option<DbGame> = self.connection.select((GAME, game_id)).await?;
        Ok(game.map(Into::into))
    }

    pub async fn get_game_options(&self, game_id: &str) -> Result<Vec<GameOption>> {
        let options: Vec<DbGameOption> = self
            .connection
            .query("SELECT * FROM game_option WHERE game = $game ORDER BY id;")
            .bind(("game", thing(GAME, game_id)))
            .await?
            .take(0)?;
        Ok(options.into_iter().map(Into::into).collect())
    }

    pub async fn get_option_votes(&self, option_id: &str) -> Result<Vec<Vote>> {
        let votes: Vec<DbVote> = self
            .connection
            .query("SELECT * FROM vote WHERE game_option = $option ORDER BY id;")
            .bind(("option", thing(GAME_OPTION, option_id)))
            .await?
            .take(0)?;
        Ok(votes.into_iter().map(Into::into).collect())
    }

    /// Unresolved games whose end time is at or before `now`.
    pub async fn get_expired_games(&self, now: DateTime<Utc>) -> Result<Vec<Game>> {
        let games: Vec<DbGame> = self
            .connection
            .query("SELECT * FROM game WHERE resolved = false;")
            .await?
            .take(0)?;
        Ok(games
            .into_iter()
            .filter(|game| game.end_time <= now)
            .map(Into::into)
            .collect())
    }

    /// Best win rates among users with more than `min_games` games played.
    pub async fn get_top_users(&self, limit: u32, min_games: u32) -> Result<Vec<User>> {
        let users: Vec<DbUser> = self
            .connection
            .query(format!(
                "SELECT * FROM user WHERE games_played > $min_games ORDER BY win_rate DESC LIMIT {limit};"
            ))
            .bind(("min_games", min_games))
            .await?
            .take(0)?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    pub async fn update_user(&mut self, user: &User) -> Result<()> {
        if self.get_user(&user.id).await?.is_none() {
            return Err(Error::not_found(RecordKind::User, &user.id));
        }
        let _: Option<Record> = self
            .connection
            .update((USER, user.id.as_str()))
            .merge(UserStanding::from(user))
            .await?;
        Ok(())
    }

    pub async fn allocate_money(&mut self, user_id: &str, delta: i64) -> Result<User> {
        let mut user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found(RecordKind::User, user_id))?;
        progression::allocate_money(&mut user, delta)?;
        self.update_user(&user).await?;
        Ok(user)
    }

    pub async fn allocate_exp(&mut self, user_id: &str, event: ExpEvent) -> Result<User> {
        let mut user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::not_found(RecordKind::User, user_id))?;
        progression::allocate_exp(&mut user, event);
        self.update_user(&user).await?;
        Ok(user)
    }

    async fn require(&self, table: &str, id: &str, kind: RecordKind) -> Result<()> {
        let record: Option<Record> = self.connection.select((table, id)).await?;
        record.map(|_| ()).ok_or_else(|| Error::not_found(kind, id))
    }

    /// Writes every record touched by a settlement in a single transaction,
    /// finishing with the game's resolved flag.
    ///
    /// Every target must already exist. Voters are read again here and the
    /// planned standing changes applied to their current state, so ledger
    /// writes served after planning are kept. The database manager serves one
    /// request at a time, so nothing changes between these reads and the
    /// commit.
    pub async fn apply_settlement(&mut self, settlement: &Settlement) -> Result<()> {
        self.require(GAME, &settlement.game.id, RecordKind::Game).await?;
        for option in &settlement.options {
            self.require(GAME_OPTION, &option.id, RecordKind::GameOption)
                .await?;
        }
        for vote in &settlement.votes {
            self.require(VOTE, &vote.id, RecordKind::Vote).await?;
        }

        let mut users = Vec::with_capacity(settlement.standings.len());
        for standing in &settlement.standings {
            let mut user = self
                .get_user(&standing.user_id)
                .await?
                .ok_or_else(|| Error::not_found(RecordKind::User, &standing.user_id))?;
            standing.apply(&mut user)?;
            users.push(user);
        }

        let mut query = self.connection.query(BeginStatement::default());

        for (i, option) in settlement.options.iter().enumerate() {
            query = query
                .query(format!("UPDATE $option_{i} MERGE $option_result_{i};"))
                .bind((format!("option_{i}"), thing(GAME_OPTION, &option.id)))
                .bind((
                    format!("option_result_{i}"),
                    OptionResult {
                        resolved: option.resolved,
                        winner: option.winner,
                        total_value: option.total_value,
                        total_votes: option.total_votes,
                    },
                ));
        }

        for (i, vote) in settlement.votes.iter().enumerate() {
            query = query
                .query(format!("UPDATE $vote_{i} MERGE $vote_result_{i};"))
                .bind((format!("vote_{i}"), thing(VOTE, &vote.id)))
                .bind((
                    format!("vote_result_{i}"),
                    VoteResult {
                        resolved: vote.resolved,
                        win: vote.win,
                        change: vote.change,
                    },
                ));
        }

        for (i, user) in users.iter().enumerate() {
            query = query
                .query(format!("UPDATE $user_{i} MERGE $user_standing_{i};"))
                .bind((format!("user_{i}"), thing(USER, &user.id)))
                .bind((format!("user_standing_{i}"), UserStanding::from(user)));
        }

        query
            .query("UPDATE $game SET resolved = true;")
            .bind(("game", thing(GAME, &settlement.game.id)))
            .query(CommitStatement::default())
            .await?
            .check()?;

        debug!(
            game_id = %settlement.game.id,
            options = settlement.options.len(),
            votes = settlement.votes.len(),
            users = users.len(),
            "settlement committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::plan_settlement;
    use chrono::Duration;
    use std::collections::HashSet;

    async fn database() -> DatabaseConnection<Db> {
        DatabaseConnection::in_memory(&DatabaseConfig::in_memory())
            .await
            .unwrap()
    }

    fn game(id: &str, end_offset_minutes: i64) -> Game {
        let now = Utc::now();
        Game {
            id: id.into(),
            owner_id: "host".into(),
            topic: format!("topic {id}"),
            start_time: now - Duration::hours(1),
            end_time: now + Duration::minutes(end_offset_minutes),
            game_mode: GameMode::Majority,
            stakes: "coins".into(),
            resolved: false,
        }
    }

    #[tokio::test]
    async fn records_round_trip_through_storage() {
        let mut db = database().await;
        let user = User::new("alice", "fb-alice", "Alice");
        db.add_user(&user).await.unwrap();
        db.add_game(&game("g1", 30)).await.unwrap();
        db.add_game_option(&GameOption::new("a", "g1", "Yes"))
            .await
            .unwrap();
        db.add_game_option(&GameOption::new("b", "g1", "No"))
            .await
            .unwrap();
        db.add_game_option(&GameOption::new("c", "g2", "Elsewhere"))
            .await
            .unwrap();
        db.add_vote(&Vote::new("v1", "g1", "a", "alice", 25))
            .await
            .unwrap();

        assert_eq!(db.get_user("alice").await.unwrap(), Some(user));
        assert!(db.get_user("nobody").await.unwrap().is_none());

        let stored = db.get_game("g1").await.unwrap().unwrap();
        assert_eq!(stored.owner_id, "host");
        assert_eq!(stored.game_mode, GameMode::Majority);

        let options = db.get_game_options("g1").await.unwrap();
        let ids: Vec<_> = options.iter().map(|option| option.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let votes = db.get_option_votes("a").await.unwrap();
        assert_eq!(votes, vec![Vote::new("v1", "g1", "a", "alice", 25)]);
        assert!(db.get_option_votes("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_games_exclude_open_and_resolved_ones() {
        let mut db = database().await;
        db.add_game(&game("open", 30)).await.unwrap();
        db.add_game(&game("expired", -5)).await.unwrap();
        let mut done = game("done", -5);
        done.resolved = true;
        db.add_game(&done).await.unwrap();

        let expired = db.get_expired_games(Utc::now()).await.unwrap();
        let ids: Vec<_> = expired.iter().map(|game| game.id.as_str()).collect();
        assert_eq!(ids, ["expired"]);
    }

    #[tokio::test]
    async fn money_allocation_never_overdraws() {
        let mut db = database().await;
        db.add_user(&User::new("bob", "fb-bob", "Bob")).await.unwrap();

        let err = db.allocate_money("bob", -101).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { balance: 100, .. }));
        assert_eq!(db.get_user("bob").await.unwrap().unwrap().money_total, 100);

        let user = db.allocate_money("bob", -60).await.unwrap();
        assert_eq!(user.money_total, 40);
        assert_eq!(db.get_user("bob").await.unwrap().unwrap().money_total, 40);

        let err = db.allocate_money("ghost", 5).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                kind: RecordKind::User,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn experience_allocation_accumulates() {
        let mut db = database().await;
        db.add_user(&User::new("host", "fb-host", "Host"))
            .await
            .unwrap();
        db.allocate_exp("host", ExpEvent::Host).await.unwrap();
        let user = db.allocate_exp("host", ExpEvent::Vote).await.unwrap();
        assert_eq!(user.experience, 15);
        assert_eq!(db.get_user("host").await.unwrap().unwrap().experience, 15);
    }

    #[tokio::test]
    async fn leaderboard_requires_enough_games() {
        let mut db = database().await;
        for (id, played, won) in [("ace", 10, 9), ("mid", 12, 6), ("new", 3, 3), ("low", 20, 2)] {
            let mut user = User::new(id, format!("fb-{id}"), id);
            user.games_played = played;
            user.games_won = won;
            user.win_rate = progression::win_rate(won, played);
            db.add_user(&user).await.unwrap();
        }

        let top = db.get_top_users(10, 9).await.unwrap();
        let ids: Vec<_> = top.iter().map(|user| user.id.as_str()).collect();
        assert_eq!(ids, ["ace", "mid", "low"]);

        let top = db.get_top_users(1, 9).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, "ace");
    }

    async fn single_vote_settlement(db: &mut DatabaseConnection<Db>, store_vote: bool) -> Settlement {
        db.add_user(&User::new("alice", "fb-alice", "Alice"))
            .await
            .unwrap();
        db.add_game(&game("g1", -5)).await.unwrap();
        let option = GameOption::new("a", "g1", "Yes");
        db.add_game_option(&option).await.unwrap();
        let vote = Vote::new("v1", "g1", "a", "alice", 10);
        if store_vote {
            db.add_vote(&vote).await.unwrap();
        }
        let voters = HashSet::from(["alice".to_string()]);
        plan_settlement(game("g1", -5), vec![(option, vec![vote])], &voters).unwrap()
    }

    #[tokio::test]
    async fn settlement_keeps_ledger_writes_made_after_planning() {
        let mut db = database().await;
        let settlement = single_vote_settlement(&mut db, true).await;

        db.allocate_money("alice", -30).await.unwrap();
        db.allocate_exp("alice", ExpEvent::Vote).await.unwrap();
        db.apply_settlement(&settlement).await.unwrap();

        // a lone winning vote gets its stake back
        let alice = db.get_user("alice").await.unwrap().unwrap();
        assert_eq!(alice.money_total, 100 - 30 + 10);
        assert_eq!(alice.experience, 5 + 10);
        assert_eq!((alice.games_played, alice.games_won), (1, 1));
        assert!(db.get_game("g1").await.unwrap().unwrap().resolved);
    }

    #[tokio::test]
    async fn settlement_never_creates_missing_records() {
        let mut db = database().await;
        let settlement = single_vote_settlement(&mut db, false).await;

        let err = db.apply_settlement(&settlement).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                kind: RecordKind::Vote,
                ..
            }
        ));
        assert!(db.get_option_votes("a").await.unwrap().is_empty());
        assert!(!db.get_game_options("g1").await.unwrap()[0].resolved);
        assert!(!db.get_game("g1").await.unwrap().unwrap().resolved);
        assert_eq!(db.get_user("alice").await.unwrap().unwrap().money_total, 100);
    }
}

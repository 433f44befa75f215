//! Auction Store
//! Mission: SQLite persistence for players, teams, participations, and
//! auctions, with every multi-row mutation scoped to one transaction.
//!
//! The store owns a single connection behind an async mutex. All writes go
//! through [`AuctionStore::with_write`], which wraps the closure in an
//! immediate transaction: either every ledger touch commits or none do. The
//! "one live auction per tournament" rule is enforced here with a partial
//! unique index, not just in the engine.

use crate::auction::error::AuctionError;
use crate::models::{
    Auction, AuctionStatus, Bid, Participation, ParticipationStatus, Player, Team,
};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuctionStore {
    conn: Arc<Mutex<Connection>>,
}

impl AuctionStore {
    /// Open (or create) the auction database and initialize the schema.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open auction db")?;
        Self::from_connection(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON").ok();

        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a read-only closure against the connection.
    pub async fn with_read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, AuctionError>,
    ) -> Result<T, AuctionError> {
        let conn = self.conn.lock().await;
        f(&conn)
    }

    /// Run a closure inside an immediate transaction. The closure's error
    /// rolls everything back; success commits atomically. Because the
    /// connection mutex is held for the duration, concurrent bid/complete
    /// calls on the same auction serialize here.
    pub async fn with_write<T>(
        &self,
        f: impl FnOnce(&Transaction) -> Result<T, AuctionError>,
    ) -> Result<T, AuctionError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS players (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            photo TEXT,
            batting_style TEXT,
            bowling_style TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            tournament_id TEXT NOT NULL,
            name TEXT NOT NULL,
            color TEXT,
            owner TEXT,
            budget INTEGER NOT NULL,
            remaining_budget INTEGER NOT NULL CHECK (remaining_budget >= 0)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS team_players (
            team_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            PRIMARY KEY (team_id, player_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS participations (
            id TEXT PRIMARY KEY,
            player_id TEXT NOT NULL,
            tournament_id TEXT NOT NULL,
            status TEXT NOT NULL,
            base_price INTEGER NOT NULL,
            price INTEGER,
            team_id TEXT,
            category TEXT NOT NULL,
            UNIQUE (player_id, tournament_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS auctions (
            id TEXT PRIMARY KEY,
            player_id TEXT NOT NULL,
            tournament_id TEXT NOT NULL,
            status TEXT NOT NULL,
            bid_amount INTEGER NOT NULL,
            current_bidder TEXT,
            winner TEXT,
            final_amount INTEGER,
            created_at TEXT NOT NULL,
            completed_at TEXT
        )",
        [],
    )?;

    // Storage-level "one item on the table" guarantee.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS one_live_auction_per_tournament
         ON auctions (tournament_id) WHERE status IN ('open', 'active')",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bids (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            auction_id TEXT NOT NULL,
            team_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            ts TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS bids_by_auction ON bids (auction_id, seq)",
        [],
    )?;

    Ok(())
}

fn parse_uuid(raw: &str) -> Result<Uuid, AuctionError> {
    Uuid::parse_str(raw).map_err(|_| AuctionError::Persistence(format!("corrupt uuid: {raw}")))
}

/// Participation Ledger: the per-(player, tournament) sale record. Everything
/// else mutates state through these functions.
pub mod participations {
    use super::*;

    pub fn insert(conn: &Connection, p: &Participation) -> Result<(), AuctionError> {
        conn.execute(
            "INSERT INTO participations (id, player_id, tournament_id, status, base_price, price, team_id, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                p.id.to_string(),
                p.player_id.to_string(),
                p.tournament_id,
                p.status.as_str(),
                p.base_price,
                p.price,
                p.team_id.map(|t| t.to_string()),
                p.category,
            ],
        )?;
        Ok(())
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, i64, Option<i64>, Option<String>, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn materialize(
        (id, player_id, tournament_id, status, base_price, price, team_id, category): (
            String,
            String,
            String,
            String,
            i64,
            Option<i64>,
            Option<String>,
            String,
        ),
    ) -> Result<Participation, AuctionError> {
        Ok(Participation {
            id: parse_uuid(&id)?,
            player_id: parse_uuid(&player_id)?,
            tournament_id,
            status: ParticipationStatus::from_str(&status)
                .ok_or_else(|| AuctionError::Persistence(format!("unknown status: {status}")))?,
            base_price,
            price,
            team_id: team_id.as_deref().map(parse_uuid).transpose()?,
            category,
        })
    }

    const COLUMNS: &str =
        "id, player_id, tournament_id, status, base_price, price, team_id, category";

    pub fn get(
        conn: &Connection,
        player_id: Uuid,
        tournament_id: &str,
    ) -> Result<Option<Participation>, AuctionError> {
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM participations WHERE player_id = ?1 AND tournament_id = ?2"
                ),
                params![player_id.to_string(), tournament_id],
                from_row,
            )
            .optional()?;
        raw.map(materialize).transpose()
    }

    pub fn list(conn: &Connection, tournament_id: &str) -> Result<Vec<Participation>, AuctionError> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {COLUMNS} FROM participations WHERE tournament_id = ?1 ORDER BY category, base_price DESC"
        ))?;
        let rows = stmt
            .query_map(params![tournament_id], from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(materialize).collect()
    }

    pub fn set_status(
        conn: &Connection,
        participation_id: Uuid,
        status: ParticipationStatus,
    ) -> Result<(), AuctionError> {
        conn.execute(
            "UPDATE participations SET status = ?1 WHERE id = ?2",
            params![status.as_str(), participation_id.to_string()],
        )?;
        Ok(())
    }

    /// Settlement with a winner: record sale price and owning team.
    pub fn mark_sold(
        conn: &Connection,
        participation_id: Uuid,
        team_id: Uuid,
        price: i64,
    ) -> Result<(), AuctionError> {
        conn.execute(
            "UPDATE participations SET status = 'sold', price = ?1, team_id = ?2 WHERE id = ?3",
            params![price, team_id.to_string(), participation_id.to_string()],
        )?;
        Ok(())
    }

    /// Reverse of `mark_sold`: clear team and price, back to available.
    pub fn revert_sale(conn: &Connection, participation_id: Uuid) -> Result<(), AuctionError> {
        conn.execute(
            "UPDATE participations SET status = 'available', price = NULL, team_id = NULL WHERE id = ?1",
            params![participation_id.to_string()],
        )?;
        Ok(())
    }

    /// Operator bulk revert: unsold/unsold1 back to available, optionally
    /// restricted to one draft category. Returns the number of rows moved.
    pub fn bulk_revert_unsold(
        conn: &Connection,
        tournament_id: &str,
        category: Option<&str>,
    ) -> Result<usize, AuctionError> {
        let moved = match category {
            Some(cat) => conn.execute(
                "UPDATE participations SET status = 'available'
                 WHERE tournament_id = ?1 AND category = ?2 AND status IN ('unsold', 'unsold1')",
                params![tournament_id, cat],
            )?,
            None => conn.execute(
                "UPDATE participations SET status = 'available'
                 WHERE tournament_id = ?1 AND status IN ('unsold', 'unsold1')",
                params![tournament_id],
            )?,
        };
        Ok(moved)
    }

    /// Tournament draft restart: everything back to available with no owner.
    pub fn reset_for_tournament(
        conn: &Connection,
        tournament_id: &str,
    ) -> Result<usize, AuctionError> {
        let reset = conn.execute(
            "UPDATE participations SET status = 'available', price = NULL, team_id = NULL
             WHERE tournament_id = ?1",
            params![tournament_id],
        )?;
        Ok(reset)
    }

    /// Remove a participation; deletes the player row too if no other
    /// tournament references it.
    pub fn remove(
        conn: &Connection,
        player_id: Uuid,
        tournament_id: &str,
    ) -> Result<bool, AuctionError> {
        let removed = conn.execute(
            "DELETE FROM participations WHERE player_id = ?1 AND tournament_id = ?2",
            params![player_id.to_string(), tournament_id],
        )?;
        if removed == 0 {
            return Ok(false);
        }

        let references: i64 = conn.query_row(
            "SELECT COUNT(*) FROM participations WHERE player_id = ?1",
            params![player_id.to_string()],
            |row| row.get(0),
        )?;
        if references == 0 {
            conn.execute(
                "DELETE FROM players WHERE id = ?1",
                params![player_id.to_string()],
            )?;
        }
        Ok(true)
    }
}

/// Team Budget Ledger: remaining budget and roster. Only settlement and its
/// explicit reversal call `debit`/`credit`.
pub mod teams {
    use super::*;

    pub fn insert(conn: &Connection, team: &Team) -> Result<(), AuctionError> {
        conn.execute(
            "INSERT INTO teams (id, tournament_id, name, color, owner, budget, remaining_budget)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                team.id.to_string(),
                team.tournament_id,
                team.name,
                team.color,
                team.owner,
                team.budget,
                team.remaining_budget,
            ],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, team_id: Uuid) -> Result<Option<Team>, AuctionError> {
        let raw = conn
            .query_row(
                "SELECT id, tournament_id, name, color, owner, budget, remaining_budget
                 FROM teams WHERE id = ?1",
                params![team_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, tournament_id, name, color, owner, budget, remaining_budget)) = raw else {
            return Ok(None);
        };

        Ok(Some(Team {
            id: parse_uuid(&id)?,
            tournament_id,
            name,
            color,
            owner,
            budget,
            remaining_budget,
            players: roster(conn, team_id)?,
        }))
    }

    pub fn list(conn: &Connection, tournament_id: &str) -> Result<Vec<Team>, AuctionError> {
        let mut stmt = conn.prepare_cached(
            "SELECT id FROM teams WHERE tournament_id = ?1 ORDER BY name",
        )?;
        let ids = stmt
            .query_map(params![tournament_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(team) = get(conn, parse_uuid(&id)?)? {
                out.push(team);
            }
        }
        Ok(out)
    }

    fn roster(conn: &Connection, team_id: Uuid) -> Result<Vec<Uuid>, AuctionError> {
        let mut stmt = conn.prepare_cached(
            "SELECT player_id FROM team_players WHERE team_id = ?1 ORDER BY player_id",
        )?;
        let ids = stmt
            .query_map(params![team_id.to_string()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ids.iter().map(|s| parse_uuid(s)).collect()
    }

    /// Take `amount` from the team's remaining budget. Fails without writing
    /// when the budget cannot cover it.
    pub fn debit(conn: &Connection, team_id: Uuid, amount: i64) -> Result<(), AuctionError> {
        let remaining: Option<i64> = conn
            .query_row(
                "SELECT remaining_budget FROM teams WHERE id = ?1",
                params![team_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let remaining = remaining.ok_or(AuctionError::TeamNotFound)?;
        if remaining < amount {
            return Err(AuctionError::InsufficientBudget { remaining });
        }

        conn.execute(
            "UPDATE teams SET remaining_budget = remaining_budget - ?1 WHERE id = ?2",
            params![amount, team_id.to_string()],
        )?;
        Ok(())
    }

    /// Refund `amount`. Deliberately not clamped against the budget ceiling:
    /// the original system allows a manual price edit between sale and refund
    /// to overshoot, and that behavior is preserved until confirmed otherwise.
    pub fn credit(conn: &Connection, team_id: Uuid, amount: i64) -> Result<(), AuctionError> {
        let updated = conn.execute(
            "UPDATE teams SET remaining_budget = remaining_budget + ?1 WHERE id = ?2",
            params![amount, team_id.to_string()],
        )?;
        if updated == 0 {
            return Err(AuctionError::TeamNotFound);
        }
        Ok(())
    }

    pub fn add_player(conn: &Connection, team_id: Uuid, player_id: Uuid) -> Result<(), AuctionError> {
        conn.execute(
            "INSERT OR IGNORE INTO team_players (team_id, player_id) VALUES (?1, ?2)",
            params![team_id.to_string(), player_id.to_string()],
        )?;
        Ok(())
    }

    pub fn remove_player(
        conn: &Connection,
        team_id: Uuid,
        player_id: Uuid,
    ) -> Result<(), AuctionError> {
        conn.execute(
            "DELETE FROM team_players WHERE team_id = ?1 AND player_id = ?2",
            params![team_id.to_string(), player_id.to_string()],
        )?;
        Ok(())
    }

    /// Draft restart: full budgets, empty rosters.
    pub fn reset_for_tournament(conn: &Connection, tournament_id: &str) -> Result<(), AuctionError> {
        conn.execute(
            "UPDATE teams SET remaining_budget = budget WHERE tournament_id = ?1",
            params![tournament_id],
        )?;
        conn.execute(
            "DELETE FROM team_players WHERE team_id IN
             (SELECT id FROM teams WHERE tournament_id = ?1)",
            params![tournament_id],
        )?;
        Ok(())
    }
}

pub mod players {
    use super::*;

    pub fn insert(conn: &Connection, player: &Player) -> Result<(), AuctionError> {
        conn.execute(
            "INSERT INTO players (id, name, photo, batting_style, bowling_style)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                player.id.to_string(),
                player.name,
                player.photo,
                player.batting_style,
                player.bowling_style,
            ],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, player_id: Uuid) -> Result<Option<Player>, AuctionError> {
        let raw = conn
            .query_row(
                "SELECT id, name, photo, batting_style, bowling_style FROM players WHERE id = ?1",
                params![player_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, name, photo, batting_style, bowling_style)) = raw else {
            return Ok(None);
        };
        Ok(Some(Player {
            id: parse_uuid(&id)?,
            name,
            photo,
            batting_style,
            bowling_style,
        }))
    }
}

pub mod auctions {
    use super::*;

    pub fn insert(conn: &Connection, auction: &Auction) -> Result<(), AuctionError> {
        conn.execute(
            "INSERT INTO auctions (id, player_id, tournament_id, status, bid_amount, current_bidder, winner, final_amount, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                auction.id.to_string(),
                auction.player_id.to_string(),
                auction.tournament_id,
                auction.status.as_str(),
                auction.bid_amount,
                auction.current_bidder.map(|t| t.to_string()),
                auction.winner.map(|t| t.to_string()),
                auction.final_amount,
                auction.created_at,
                auction.completed_at,
            ],
        )?;
        Ok(())
    }

    fn from_row(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(
        String,
        String,
        String,
        String,
        i64,
        Option<String>,
        Option<String>,
        Option<i64>,
        String,
        Option<String>,
    )> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
        ))
    }

    const COLUMNS: &str = "id, player_id, tournament_id, status, bid_amount, current_bidder, winner, final_amount, created_at, completed_at";

    fn materialize(
        conn: &Connection,
        (id, player_id, tournament_id, status, bid_amount, current_bidder, winner, final_amount, created_at, completed_at): (
            String,
            String,
            String,
            String,
            i64,
            Option<String>,
            Option<String>,
            Option<i64>,
            String,
            Option<String>,
        ),
    ) -> Result<Auction, AuctionError> {
        let auction_id = parse_uuid(&id)?;
        Ok(Auction {
            id: auction_id,
            player_id: parse_uuid(&player_id)?,
            tournament_id,
            status: AuctionStatus::from_str(&status)
                .ok_or_else(|| AuctionError::Persistence(format!("unknown status: {status}")))?,
            bid_amount,
            current_bidder: current_bidder.as_deref().map(parse_uuid).transpose()?,
            bids: bids_for(conn, auction_id)?,
            winner: winner.as_deref().map(parse_uuid).transpose()?,
            final_amount,
            created_at,
            completed_at,
        })
    }

    fn bids_for(conn: &Connection, auction_id: Uuid) -> Result<Vec<Bid>, AuctionError> {
        let mut stmt = conn.prepare_cached(
            "SELECT team_id, amount, ts FROM bids WHERE auction_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![auction_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(team_id, amount, timestamp)| {
                Ok(Bid {
                    team_id: parse_uuid(&team_id)?,
                    amount,
                    timestamp,
                })
            })
            .collect()
    }

    pub fn get(conn: &Connection, auction_id: Uuid) -> Result<Option<Auction>, AuctionError> {
        let raw = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM auctions WHERE id = ?1"),
                params![auction_id.to_string()],
                from_row,
            )
            .optional()?;
        raw.map(|r| materialize(conn, r)).transpose()
    }

    /// The single live auction for a tournament, if any. The partial unique
    /// index guarantees at most one row matches.
    pub fn current_for_tournament(
        conn: &Connection,
        tournament_id: &str,
    ) -> Result<Option<Auction>, AuctionError> {
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM auctions
                     WHERE tournament_id = ?1 AND status IN ('open', 'active')"
                ),
                params![tournament_id],
                from_row,
            )
            .optional()?;
        raw.map(|r| materialize(conn, r)).transpose()
    }

    /// Append an accepted bid and advance the running highest bid. Kept in
    /// one place so `bid_amount`, `current_bidder`, and the bid log can never
    /// drift apart.
    pub fn record_bid(conn: &Connection, auction_id: Uuid, bid: &Bid) -> Result<(), AuctionError> {
        conn.execute(
            "INSERT INTO bids (auction_id, team_id, amount, ts) VALUES (?1, ?2, ?3, ?4)",
            params![
                auction_id.to_string(),
                bid.team_id.to_string(),
                bid.amount,
                bid.timestamp,
            ],
        )?;
        conn.execute(
            "UPDATE auctions SET bid_amount = ?1, current_bidder = ?2 WHERE id = ?3",
            params![bid.amount, bid.team_id.to_string(), auction_id.to_string()],
        )?;
        Ok(())
    }

    pub fn mark_sold(
        conn: &Connection,
        auction_id: Uuid,
        winner: Uuid,
        final_amount: i64,
        completed_at: &str,
    ) -> Result<(), AuctionError> {
        conn.execute(
            "UPDATE auctions SET status = 'sold', winner = ?1, final_amount = ?2, completed_at = ?3
             WHERE id = ?4",
            params![
                winner.to_string(),
                final_amount,
                completed_at,
                auction_id.to_string()
            ],
        )?;
        Ok(())
    }

    pub fn mark_unsold(
        conn: &Connection,
        auction_id: Uuid,
        completed_at: &str,
    ) -> Result<(), AuctionError> {
        conn.execute(
            "UPDATE auctions SET status = 'unsold', completed_at = ?1 WHERE id = ?2",
            params![completed_at, auction_id.to_string()],
        )?;
        Ok(())
    }

    /// Completed auctions for a tournament, newest first.
    pub fn history(conn: &Connection, tournament_id: &str) -> Result<Vec<Auction>, AuctionError> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {COLUMNS} FROM auctions
             WHERE tournament_id = ?1 AND status IN ('sold', 'unsold')
             ORDER BY completed_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![tournament_id], from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|r| materialize(conn, r)).collect()
    }

    pub fn delete_for_tournament(conn: &Connection, tournament_id: &str) -> Result<usize, AuctionError> {
        conn.execute(
            "DELETE FROM bids WHERE auction_id IN
             (SELECT id FROM auctions WHERE tournament_id = ?1)",
            params![tournament_id],
        )?;
        let deleted = conn.execute(
            "DELETE FROM auctions WHERE tournament_id = ?1",
            params![tournament_id],
        )?;
        Ok(deleted)
    }
}

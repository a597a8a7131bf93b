//! Roster ownership store.
//!
//! One row per hold of a player by a team. At most one row per
//! `(league_id, player_id)` has `active = true` (backed by a partial unique
//! index); ownership changes close the old row (`valid_to`) and insert a
//! new one, so history is never rewritten.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnection;
use sqlx::{PgPool, Row};

use crate::core_types::{Amount, LeagueId, PlayerId, TeamId};
use crate::market::error::MarketError;

/// Positional slot. New acquisitions always land on the bench; lineup
/// management happens outside the market engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Slot {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
    Bench,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Goalkeeper => "GK",
            Slot::Defender => "DEF",
            Slot::Midfielder => "MID",
            Slot::Forward => "FWD",
            Slot::Bench => "BENCH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GK" => Some(Slot::Goalkeeper),
            "DEF" => Some(Slot::Defender),
            "MID" => Some(Slot::Midfielder),
            "FWD" => Some(Slot::Forward),
            "BENCH" => Some(Slot::Bench),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RosterSlot {
    pub roster_id: i64,
    pub league_id: LeagueId,
    pub team_id: TeamId,
    pub player_id: PlayerId,
    pub slot: Slot,
    pub starter: bool,
    pub active: bool,
    pub acquisition_price: Amount,
    pub clause_value: Amount,
    pub locked_until: Option<DateTime<Utc>>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

fn slot_from_row(row: &sqlx::postgres::PgRow) -> RosterSlot {
    RosterSlot {
        roster_id: row.get("roster_id"),
        league_id: row.get("league_id"),
        team_id: row.get("team_id"),
        player_id: row.get("player_id"),
        slot: Slot::parse(row.get::<&str, _>("slot")).unwrap_or(Slot::Bench),
        starter: row.get("starter"),
        active: row.get("active"),
        acquisition_price: row.get("acquisition_price"),
        clause_value: row.get("clause_value"),
        locked_until: row.get("locked_until"),
        valid_from: row.get("valid_from"),
        valid_to: row.get("valid_to"),
    }
}

const SLOT_COLUMNS: &str = "roster_id, league_id, team_id, player_id, slot, starter, active, \
                            acquisition_price, clause_value, locked_until, valid_from, valid_to";

pub struct RosterStore;

impl RosterStore {
    /// The active holder of a player in a league, if any. Plain read.
    pub async fn active_slot(
        pool: &PgPool,
        league_id: LeagueId,
        player_id: PlayerId,
    ) -> Result<Option<RosterSlot>, MarketError> {
        let row = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM roster_tb \
             WHERE league_id = $1 AND player_id = $2 AND active"
        ))
        .bind(league_id)
        .bind(player_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| slot_from_row(&r)))
    }

    /// Same lookup, but locking the row on the caller's transaction.
    pub async fn lock_active_slot(
        conn: &mut PgConnection,
        league_id: LeagueId,
        player_id: PlayerId,
    ) -> Result<Option<RosterSlot>, MarketError> {
        let row = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM roster_tb \
             WHERE league_id = $1 AND player_id = $2 AND active FOR UPDATE"
        ))
        .bind(league_id)
        .bind(player_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| slot_from_row(&r)))
    }

    /// Close whatever active slot exists for `(league_id, player_id)`.
    ///
    /// Runs unconditionally before inserting a new holder; the slot may
    /// belong to the seller or, for free agents, to nobody. Returns the
    /// team that lost the player, if any.
    pub async fn deactivate_active_slot(
        conn: &mut PgConnection,
        league_id: LeagueId,
        player_id: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Option<TeamId>, MarketError> {
        let row = sqlx::query(
            r#"UPDATE roster_tb SET active = FALSE, valid_to = $3
               WHERE league_id = $1 AND player_id = $2 AND active
               RETURNING team_id"#,
        )
        .bind(league_id)
        .bind(player_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| r.get("team_id")))
    }

    /// Insert the new active slot for an acquisition.
    pub async fn insert_acquired_slot(
        conn: &mut PgConnection,
        league_id: LeagueId,
        team_id: TeamId,
        player_id: PlayerId,
        price: Amount,
        now: DateTime<Utc>,
    ) -> Result<i64, MarketError> {
        let roster_id: i64 = sqlx::query_scalar(
            r#"INSERT INTO roster_tb
                   (league_id, team_id, player_id, slot, starter, active,
                    acquisition_price, clause_value, valid_from)
               VALUES ($1, $2, $3, $4, FALSE, TRUE, $5, $5, $6)
               RETURNING roster_id"#,
        )
        .bind(league_id)
        .bind(team_id)
        .bind(player_id)
        .bind(Slot::Bench.as_str())
        .bind(price)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(roster_id)
    }

    /// Clear clause locks that have expired. Scheduler maintenance job;
    /// the game-side population of `locked_until` happens in ingestion.
    pub async fn release_expired_locks(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<u64, MarketError> {
        let result = sqlx::query(
            "UPDATE roster_tb SET locked_until = NULL \
             WHERE active AND locked_until IS NOT NULL AND locked_until <= $1",
        )
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_round_trip() {
        for s in [
            Slot::Goalkeeper,
            Slot::Defender,
            Slot::Midfielder,
            Slot::Forward,
            Slot::Bench,
        ] {
            assert_eq!(Slot::parse(s.as_str()), Some(s));
        }
        assert_eq!(Slot::parse("COACH"), None);
    }
}

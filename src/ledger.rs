//! Budget ledger - the audit trail behind every realized balance change.
//!
//! `budget_remaining` is only ever written through [`apply_delta`], which
//! pairs the row update with an append-only `ledger_tb` entry inside the
//! caller's transaction. Reservations (`budget_reserved`) are not ledger
//! movements; they are adjusted directly by the bid and settlement paths.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnection;
use sqlx::{PgPool, Row};

use crate::core_types::{Amount, TeamId};
use crate::market::error::MarketError;

/// Cause of a realized balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntryType {
    /// Winner debit at auction settlement.
    AuctionWin,
    /// Buyer debit when paying a player's release clause.
    ClausePayment,
    /// Seller credit from a clause payment or accepted listing.
    Sale,
    /// Matchday / season reward credit.
    Reward,
    /// Manual correction by an operator.
    Adjustment,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::AuctionWin => "AUCTION_WIN",
            LedgerEntryType::ClausePayment => "CLAUSE_PAYMENT",
            LedgerEntryType::Sale => "SALE",
            LedgerEntryType::Reward => "REWARD",
            LedgerEntryType::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AUCTION_WIN" => Some(LedgerEntryType::AuctionWin),
            "CLAUSE_PAYMENT" => Some(LedgerEntryType::ClausePayment),
            "SALE" => Some(LedgerEntryType::Sale),
            "REWARD" => Some(LedgerEntryType::Reward),
            "ADJUSTMENT" => Some(LedgerEntryType::Adjustment),
            _ => None,
        }
    }
}

/// One immutable audit row from `ledger_tb`.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub entry_id: i64,
    pub team_id: TeamId,
    pub entry_type: String,
    pub delta: Amount,
    pub balance_after: Amount,
    pub ref_id: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

pub struct LedgerService;

impl LedgerService {
    /// Apply a realized balance change on the caller's open transaction.
    ///
    /// Locks the team row, rejects any delta that would take
    /// `budget_remaining` negative, writes the new balance and appends the
    /// ledger row. Returns the balance after the change.
    pub async fn apply_delta(
        conn: &mut PgConnection,
        team_id: TeamId,
        delta: Amount,
        entry_type: LedgerEntryType,
        metadata: Option<serde_json::Value>,
        ref_id: Option<i64>,
    ) -> Result<Amount, MarketError> {
        let row = sqlx::query("SELECT budget_remaining FROM teams_tb WHERE team_id = $1 FOR UPDATE")
            .bind(team_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(MarketError::TeamNotFound(team_id))?;

        let remaining: i64 = row.get("budget_remaining");
        let new_balance = remaining.checked_add(delta).ok_or(MarketError::Overflow)?;
        if new_balance < 0 {
            return Err(MarketError::InsufficientFunds);
        }

        sqlx::query("UPDATE teams_tb SET budget_remaining = $1 WHERE team_id = $2")
            .bind(new_balance)
            .bind(team_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"INSERT INTO ledger_tb (team_id, entry_type, delta, balance_after, ref_id, metadata)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(team_id)
        .bind(entry_type.as_str())
        .bind(delta)
        .bind(new_balance)
        .bind(ref_id)
        .bind(metadata)
        .execute(&mut *conn)
        .await?;

        Ok(new_balance)
    }

    /// Apply a delta in its own transaction.
    ///
    /// Entry point for the clause-payment and reward flows that live above
    /// this core and have no surrounding transaction of their own.
    pub async fn apply_standalone(
        pool: &PgPool,
        team_id: TeamId,
        delta: Amount,
        entry_type: LedgerEntryType,
        metadata: Option<serde_json::Value>,
        ref_id: Option<i64>,
    ) -> Result<Amount, MarketError> {
        let mut tx = pool.begin().await?;
        let balance =
            Self::apply_delta(&mut *tx, team_id, delta, entry_type, metadata, ref_id).await?;
        tx.commit().await?;

        tracing::info!(
            team_id,
            delta,
            balance,
            entry_type = entry_type.as_str(),
            "Ledger delta applied"
        );
        Ok(balance)
    }

    /// Most recent ledger rows for a team, newest first.
    pub async fn history(
        pool: &PgPool,
        team_id: TeamId,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, MarketError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"SELECT entry_id, team_id, entry_type, delta, balance_after, ref_id, metadata, created_at
               FROM ledger_tb
               WHERE team_id = $1
               ORDER BY entry_id DESC
               LIMIT $2"#,
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_round_trip() {
        for t in [
            LedgerEntryType::AuctionWin,
            LedgerEntryType::ClausePayment,
            LedgerEntryType::Sale,
            LedgerEntryType::Reward,
            LedgerEntryType::Adjustment,
        ] {
            assert_eq!(LedgerEntryType::parse(t.as_str()), Some(t));
        }
        assert_eq!(LedgerEntryType::parse("BONUS"), None);
    }
}

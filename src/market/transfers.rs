//! Append-only transfer audit log.

use sqlx::postgres::PgConnection;
use sqlx::PgPool;

use crate::core_types::{Amount, LeagueId, OrderId, PlayerId, TeamId};
use crate::market::error::MarketError;
use crate::market::types::TransferRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCause {
    AuctionWin,
    ClausePayment,
}

impl TransferCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferCause::AuctionWin => "AUCTION_WIN",
            TransferCause::ClausePayment => "CLAUSE_PAYMENT",
        }
    }
}

pub struct TransferLog;

impl TransferLog {
    pub async fn append(
        conn: &mut PgConnection,
        league_id: LeagueId,
        player_id: PlayerId,
        from_team_id: Option<TeamId>,
        to_team_id: TeamId,
        amount: Amount,
        cause: TransferCause,
        order_id: Option<OrderId>,
    ) -> Result<TransferRecord, MarketError> {
        let record = sqlx::query_as::<_, TransferRecord>(
            r#"INSERT INTO transfer_history
                   (league_id, player_id, from_team_id, to_team_id, amount, cause, order_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING transfer_id, league_id, player_id, from_team_id, to_team_id,
                         amount, cause, order_id, created_at"#,
        )
        .bind(league_id)
        .bind(player_id)
        .bind(from_team_id)
        .bind(to_team_id)
        .bind(amount)
        .bind(cause.as_str())
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(record)
    }

    pub async fn recent(
        pool: &PgPool,
        league_id: LeagueId,
        limit: i64,
    ) -> Result<Vec<TransferRecord>, MarketError> {
        let records = sqlx::query_as::<_, TransferRecord>(
            r#"SELECT transfer_id, league_id, player_id, from_team_id, to_team_id,
                      amount, cause, order_id, created_at
               FROM transfer_history
               WHERE league_id = $1
               ORDER BY transfer_id DESC
               LIMIT $2"#,
        )
        .bind(league_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }
}

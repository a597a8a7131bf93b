//! Order store - listing/auction rows and their status transitions.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnection;
use sqlx::{PgPool, Row};

use crate::core_types::{Amount, LeagueId, OrderId, PlayerId, TeamId};
use crate::market::error::MarketError;
use crate::market::types::{MarketOrder, OrderStatus, OrderType};

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<MarketOrder, MarketError> {
    let type_str: &str = row.get("order_type");
    let status_str: &str = row.get("status");
    let order_id: i64 = row.get("order_id");

    let order_type = OrderType::parse(type_str)
        .ok_or_else(|| MarketError::InvalidInput(format!("order {order_id}: bad type {type_str}")))?;
    let status = OrderStatus::parse(status_str).ok_or_else(|| {
        MarketError::InvalidInput(format!("order {order_id}: bad status {status_str}"))
    })?;

    Ok(MarketOrder {
        order_id,
        league_id: row.get("league_id"),
        player_id: row.get("player_id"),
        owner_team_id: row.get("owner_team_id"),
        order_type,
        status,
        min_price: row.get("min_price"),
        opens_at: row.get("opens_at"),
        closes_at: row.get("closes_at"),
    })
}

const ORDER_COLUMNS: &str =
    "order_id, league_id, player_id, owner_team_id, order_type, status, min_price, opens_at, closes_at";

pub struct OrderStore;

impl OrderStore {
    pub async fn insert(
        conn: &mut PgConnection,
        league_id: LeagueId,
        player_id: PlayerId,
        owner_team_id: Option<TeamId>,
        order_type: OrderType,
        min_price: Amount,
        opens_at: DateTime<Utc>,
        closes_at: DateTime<Utc>,
    ) -> Result<MarketOrder, MarketError> {
        let row = sqlx::query(&format!(
            "INSERT INTO orders_tb \
                 (league_id, player_id, owner_team_id, order_type, status, min_price, opens_at, closes_at) \
             VALUES ($1, $2, $3, $4, 'OPEN', $5, $6, $7) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(league_id)
        .bind(player_id)
        .bind(owner_team_id)
        .bind(order_type.as_str())
        .bind(min_price)
        .bind(opens_at)
        .bind(closes_at)
        .fetch_one(&mut *conn)
        .await?;

        order_from_row(&row)
    }

    pub async fn get(pool: &PgPool, order_id: OrderId) -> Result<Option<MarketOrder>, MarketError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders_tb WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| order_from_row(&r)).transpose()
    }

    /// Lock one order row for the duration of the caller's transaction.
    /// First lock of every mutating sequence (order -> team -> roster).
    pub async fn lock(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<Option<MarketOrder>, MarketError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders_tb WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|r| order_from_row(&r)).transpose()
    }

    /// Expired, still-open auctions for one league. Plain read; each
    /// candidate is re-locked and re-checked inside its own settlement
    /// transaction.
    pub async fn expired_auction_ids(
        pool: &PgPool,
        league_id: LeagueId,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderId>, MarketError> {
        let ids = sqlx::query_scalar(
            "SELECT order_id FROM orders_tb \
             WHERE league_id = $1 AND order_type = 'AUCTION' AND status = 'OPEN' AND closes_at <= $2 \
             ORDER BY order_id",
        )
        .bind(league_id)
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    /// Claim one expired auction for settlement, skipping rows another
    /// worker already holds. Returns `None` when the row is claimed
    /// elsewhere or no longer an expired open auction.
    pub async fn claim_for_settlement(
        conn: &mut PgConnection,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<MarketOrder>, MarketError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders_tb \
             WHERE order_id = $1 AND order_type = 'AUCTION' AND status = 'OPEN' AND closes_at <= $2 \
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(order_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|r| order_from_row(&r)).transpose()
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), MarketError> {
        sqlx::query("UPDATE orders_tb SET status = $1 WHERE order_id = $2")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

//! Bid engine - validation and incremental budget reservation.

use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgConnection;
use sqlx::{PgPool, Row};
use validator::Validate;

use crate::catalog::PlayerCatalog;
use crate::core_types::{Amount, OrderId, TeamId};
use crate::market::error::MarketError;
use crate::market::notify::{MarketEvent, MarketNotifier};
use crate::market::orders::OrderStore;
use crate::market::types::{Bid, BidReceipt, OrderStatus, PlaceBidRequest};

/// Lowest acceptable bid given the current top bid and the order floor.
///
/// A first bid must meet the floor (`min_price`, or 1 when the order has
/// none); any later bid must beat the standing top by at least one minor
/// unit.
pub(crate) fn min_required(top_bid: Option<Amount>, min_price: Amount) -> Amount {
    let floor = if min_price > 0 { min_price } else { 1 };
    match top_bid {
        Some(top) => floor.max(top + 1),
        None => floor,
    }
}

/// Budget that must newly move into reservation for this bid.
///
/// A team raising its own top bid already has `previous_own` held, so only
/// the difference is reserved. Never negative: lowering a commitment is not
/// a thing, the old top bid still stands.
pub(crate) fn extra_to_reserve(amount: Amount, previous_own: Amount) -> Amount {
    (amount - previous_own).max(0)
}

/// Team budget snapshot taken under a row lock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TeamBudget {
    pub remaining: Amount,
    pub reserved: Amount,
}

impl TeamBudget {
    pub fn available(&self) -> Amount {
        self.remaining - self.reserved
    }
}

/// Lock the team row and read both balances. Second lock of the fixed
/// acquisition order (order -> team -> roster).
pub(crate) async fn lock_team_budget(
    conn: &mut PgConnection,
    team_id: TeamId,
) -> Result<TeamBudget, MarketError> {
    let row = sqlx::query(
        "SELECT budget_remaining, budget_reserved FROM teams_tb WHERE team_id = $1 FOR UPDATE",
    )
    .bind(team_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(MarketError::TeamNotFound(team_id))?;

    Ok(TeamBudget {
        remaining: row.get("budget_remaining"),
        reserved: row.get("budget_reserved"),
    })
}

pub(crate) async fn adjust_reservation(
    conn: &mut PgConnection,
    team_id: TeamId,
    delta: Amount,
) -> Result<(), MarketError> {
    sqlx::query("UPDATE teams_tb SET budget_reserved = budget_reserved + $1 WHERE team_id = $2")
        .bind(delta)
        .bind(team_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Standing top bid on an order: highest amount, earliest placement wins
/// ties, then lowest id.
pub(crate) async fn top_bid(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<Amount>, MarketError> {
    let amount = sqlx::query_scalar(
        "SELECT amount FROM bids_tb WHERE order_id = $1 \
         ORDER BY amount DESC, created_at ASC, bid_id ASC LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(amount)
}

/// All bids on an order in winner order: amount desc, placement asc, id asc.
pub(crate) async fn load_bids(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<Bid>, MarketError> {
    let bids = sqlx::query_as::<_, Bid>(
        "SELECT bid_id, order_id, bidder_team_id, amount, created_at FROM bids_tb \
         WHERE order_id = $1 ORDER BY amount DESC, created_at ASC, bid_id ASC",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(bids)
}

/// Each bidder's standing commitment (their own top bid), ascending by
/// team id. Reservation releases follow this order so concurrent
/// settlements touching the same teams cannot deadlock.
pub(crate) fn bidder_commitments(bids: &[Bid]) -> Vec<(TeamId, Amount)> {
    let mut per_team: std::collections::BTreeMap<TeamId, Amount> = std::collections::BTreeMap::new();
    for bid in bids {
        let held = per_team.entry(bid.bidder_team_id).or_insert(0);
        if bid.amount > *held {
            *held = bid.amount;
        }
    }
    per_team.into_iter().collect()
}

pub(crate) async fn own_top_bid(
    conn: &mut PgConnection,
    order_id: OrderId,
    team_id: TeamId,
) -> Result<Amount, MarketError> {
    let amount: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(amount) FROM bids_tb WHERE order_id = $1 AND bidder_team_id = $2",
    )
    .bind(order_id)
    .bind(team_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(amount.unwrap_or(0))
}

pub struct BidService {
    pool: PgPool,
    catalog: Arc<dyn PlayerCatalog>,
    notifier: MarketNotifier,
}

impl BidService {
    pub fn new(pool: PgPool, catalog: Arc<dyn PlayerCatalog>, notifier: MarketNotifier) -> Self {
        Self {
            pool,
            catalog,
            notifier,
        }
    }

    /// Place a bid on an open order.
    ///
    /// One transaction: lock the order row, gate eligibility, lock the
    /// bidder's team row, validate price and funds, bump the reservation by
    /// the uncovered part of the raise, insert the bid. Any validation
    /// failure returns before a single row has changed.
    pub async fn place_bid(&self, req: &PlaceBidRequest) -> Result<BidReceipt, MarketError> {
        req.validate()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let order = OrderStore::lock(&mut tx, req.order_id)
            .await?
            .ok_or(MarketError::OrderNotAvailable(req.order_id))?;

        if order.status != OrderStatus::Open || order.closes_at <= now {
            return Err(MarketError::OrderNotAvailable(req.order_id));
        }

        // League pool configuration may have changed since the order opened.
        self.catalog
            .assert_player_eligible(order.league_id, order.player_id)
            .await?;

        let budget = lock_team_budget(&mut tx, req.bidder_team_id).await?;

        let top = top_bid(&mut tx, req.order_id).await?;
        let min_required = min_required(top, order.min_price);
        if req.amount < min_required {
            return Err(MarketError::BidTooLow {
                offered: req.amount,
                min_required,
            });
        }

        let previous_own = own_top_bid(&mut tx, req.order_id, req.bidder_team_id).await?;
        let extra = extra_to_reserve(req.amount, previous_own);
        if extra > budget.available() {
            return Err(MarketError::InsufficientFunds);
        }

        if extra > 0 {
            adjust_reservation(&mut tx, req.bidder_team_id, extra).await?;
        }

        let bid_id: i64 = sqlx::query_scalar(
            "INSERT INTO bids_tb (order_id, bidder_team_id, amount) \
             VALUES ($1, $2, $3) RETURNING bid_id",
        )
        .bind(req.order_id)
        .bind(req.bidder_team_id)
        .bind(req.amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = req.order_id,
            bidder_team_id = req.bidder_team_id,
            amount = req.amount,
            reserved = extra,
            "Bid placed"
        );
        self.notifier.publish(MarketEvent::BidPlaced {
            order_id: req.order_id,
            bidder_team_id: req.bidder_team_id,
            amount: req.amount,
        });

        Ok(BidReceipt {
            bid_id,
            reserved: extra,
            min_required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::BidId;

    #[test]
    fn first_bid_meets_floor() {
        assert_eq!(min_required(None, 1_000_000), 1_000_000);
    }

    #[test]
    fn floorless_order_accepts_one_minor_unit() {
        assert_eq!(min_required(None, 0), 1);
    }

    #[test]
    fn later_bid_must_beat_top() {
        assert_eq!(min_required(Some(1_500_000), 1_000_000), 1_500_001);
    }

    #[test]
    fn floor_dominates_low_top_bid() {
        // Top bid below the floor can happen if the floor was raised by a
        // later catalog revaluation; the floor still wins.
        assert_eq!(min_required(Some(40), 100), 100);
    }

    #[test]
    fn raise_reserves_only_the_difference() {
        assert_eq!(extra_to_reserve(2_000_000, 1_500_000), 500_000);
    }

    #[test]
    fn first_bid_reserves_fully() {
        assert_eq!(extra_to_reserve(1_500_000, 0), 1_500_000);
    }

    #[test]
    fn lower_than_own_previous_reserves_nothing() {
        assert_eq!(extra_to_reserve(1_000_000, 1_500_000), 0);
    }

    fn bid(bid_id: BidId, team: TeamId, amount: Amount, secs: i64) -> Bid {
        Bid {
            bid_id,
            order_id: 1,
            bidder_team_id: team,
            amount,
            created_at: chrono::DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn commitments_take_each_bidders_top_bid() {
        let bids = vec![
            bid(1, 30, 1_500_000, 0),
            bid(2, 10, 1_200_000, 1),
            bid(3, 30, 2_000_000, 2),
        ];
        assert_eq!(
            bidder_commitments(&bids),
            vec![(10, 1_200_000), (30, 2_000_000)]
        );
    }

    #[test]
    fn commitments_sorted_by_team_id() {
        let bids = vec![bid(1, 9, 100, 0), bid(2, 3, 200, 1), bid(3, 5, 300, 2)];
        let teams: Vec<_> = bidder_commitments(&bids).into_iter().map(|c| c.0).collect();
        assert_eq!(teams, vec![3, 5, 9]);
    }

    #[test]
    fn available_subtracts_reservation() {
        let b = TeamBudget {
            remaining: 10_000_000,
            reserved: 4_000_000,
        };
        assert_eq!(b.available(), 6_000_000);
    }
}

//! Listing and auction creation, plus owner cancellation.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use sqlx::PgPool;
use validator::Validate;

use crate::catalog::PlayerCatalog;
use crate::core_types::{OrderId, TeamId};
use crate::market::bids;
use crate::market::error::MarketError;
use crate::market::notify::{MarketEvent, MarketNotifier};
use crate::market::orders::OrderStore;
use crate::market::types::{
    CreateAuctionRequest, CreateListingRequest, MarketOrder, OrderStatus, OrderType,
};
use crate::roster::RosterStore;

/// Next market close in the league's local clock, as an engine timestamp.
///
/// The league configures a wall-clock close time ("HH:MM") and a UTC
/// offset. The order closes at that time today, or tomorrow when today's
/// close has already passed.
pub(crate) fn next_close_at(
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
    close_time: &str,
) -> Result<DateTime<Utc>, MarketError> {
    let close = NaiveTime::parse_from_str(close_time, "%H:%M")
        .map_err(|_| MarketError::InvalidInput(format!("bad market_close_time: {close_time}")))?;
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        MarketError::InvalidInput(format!("bad utc_offset_minutes: {utc_offset_minutes}"))
    })?;

    let local_now = now.with_timezone(&offset);
    let mut close_date = local_now.date_naive();
    if local_now.time() >= close {
        close_date = close_date.succ_opt().ok_or(MarketError::Overflow)?;
    }

    let local_close = close_date
        .and_time(close)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| MarketError::InvalidInput("unrepresentable close time".into()))?;

    Ok(local_close.with_timezone(&Utc))
}

pub struct ListingService {
    pool: PgPool,
    catalog: Arc<dyn PlayerCatalog>,
    notifier: MarketNotifier,
}

impl ListingService {
    pub fn new(pool: PgPool, catalog: Arc<dyn PlayerCatalog>, notifier: MarketNotifier) -> Self {
        Self {
            pool,
            catalog,
            notifier,
        }
    }

    /// Put a currently-owned player on the market.
    ///
    /// No budget is reserved here: reservations only exist against bids.
    pub async fn create_listing(
        &self,
        req: &CreateListingRequest,
    ) -> Result<MarketOrder, MarketError> {
        req.validate()?;

        self.catalog
            .assert_player_eligible(req.league_id, req.player_id)
            .await?;

        RosterStore::active_slot(&self.pool, req.league_id, req.player_id)
            .await?
            .filter(|s| s.team_id == req.owner_team_id)
            .ok_or(MarketError::InvalidOwnership {
                team_id: req.owner_team_id,
                player_id: req.player_id,
            })?;

        self.insert_order(
            req.league_id,
            req.player_id,
            Some(req.owner_team_id),
            OrderType::Listing,
            req.min_price,
        )
        .await
    }

    /// Open an auction. With no owner the player is a free agent put up by
    /// the league itself.
    pub async fn create_auction(
        &self,
        req: &CreateAuctionRequest,
    ) -> Result<MarketOrder, MarketError> {
        req.validate()?;

        self.catalog
            .assert_player_eligible(req.league_id, req.player_id)
            .await?;

        if let Some(owner) = req.owner_team_id {
            RosterStore::active_slot(&self.pool, req.league_id, req.player_id)
                .await?
                .filter(|s| s.team_id == owner)
                .ok_or(MarketError::InvalidOwnership {
                    team_id: owner,
                    player_id: req.player_id,
                })?;
        }

        self.insert_order(
            req.league_id,
            req.player_id,
            req.owner_team_id,
            OrderType::Auction,
            req.min_price,
        )
        .await
    }

    async fn insert_order(
        &self,
        league_id: i64,
        player_id: i64,
        owner_team_id: Option<TeamId>,
        order_type: OrderType,
        min_price: Option<i64>,
    ) -> Result<MarketOrder, MarketError> {
        let league = self.catalog.league_config(league_id).await?;
        let min_price = match min_price {
            Some(p) => p,
            None => {
                let value = self.catalog.player_value(player_id).await?;
                if value > 0 {
                    value
                } else {
                    league.default_min_price
                }
            }
        };

        let now = Utc::now();
        let closes_at = next_close_at(now, league.utc_offset_minutes, &league.market_close_time)?;

        let mut tx = self.pool.begin().await?;
        let order = OrderStore::insert(
            &mut tx,
            league_id,
            player_id,
            owner_team_id,
            order_type,
            min_price,
            now,
            closes_at,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            order_id = order.order_id,
            league_id,
            player_id,
            order_type = order_type.as_str(),
            min_price,
            %closes_at,
            "Market order opened"
        );
        Ok(order)
    }

    /// Cancel an own open order, releasing every bidder's reservation.
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        requesting_team_id: TeamId,
    ) -> Result<(), MarketError> {
        let mut tx = self.pool.begin().await?;

        let order = OrderStore::lock(&mut tx, order_id)
            .await?
            .ok_or(MarketError::OrderNotAvailable(order_id))?;

        if order.status != OrderStatus::Open {
            return Err(MarketError::OrderNotAvailable(order_id));
        }
        if order.owner_team_id != Some(requesting_team_id) {
            return Err(MarketError::InvalidOwnership {
                team_id: requesting_team_id,
                player_id: order.player_id,
            });
        }

        let all_bids = bids::load_bids(&mut tx, order_id).await?;
        for (team_id, held) in bids::bidder_commitments(&all_bids) {
            bids::adjust_reservation(&mut tx, team_id, -held).await?;
        }

        OrderStore::set_status(&mut tx, order_id, OrderStatus::Cancelled).await?;
        tx.commit().await?;

        tracing::info!(order_id, requesting_team_id, "Order cancelled");
        self.notifier.publish(MarketEvent::OrderClosed { order_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn close_later_today_stays_on_today() {
        // 10:00 UTC, league at UTC+2 => 12:00 local, close 20:00 local
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        let close = next_close_at(now, 120, "20:00").unwrap();
        assert_eq!(close, Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap());
    }

    #[test]
    fn close_already_past_rolls_to_tomorrow() {
        // 19:30 UTC at UTC+2 is 21:30 local, past a 20:00 close
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 19, 30, 0).unwrap();
        let close = next_close_at(now, 120, "20:00").unwrap();
        assert_eq!(close, Utc.with_ymd_and_hms(2025, 3, 11, 18, 0, 0).unwrap());
    }

    #[test]
    fn exact_close_instant_rolls_forward() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap();
        let close = next_close_at(now, 120, "20:00").unwrap();
        assert_eq!(close, Utc.with_ymd_and_hms(2025, 3, 11, 18, 0, 0).unwrap());
    }

    #[test]
    fn negative_offset_league() {
        // 01:00 UTC at UTC-5 is 20:00 yesterday local; close 22:00 local
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 1, 0, 0).unwrap();
        let close = next_close_at(now, -300, "22:00").unwrap();
        assert_eq!(close, Utc.with_ymd_and_hms(2025, 3, 10, 3, 0, 0).unwrap());
    }

    #[test]
    fn malformed_close_time_is_rejected() {
        let now = Utc::now();
        assert!(matches!(
            next_close_at(now, 0, "25:99"),
            Err(MarketError::InvalidInput(_))
        ));
    }
}

//! Market order and bid models, plus the validated request payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::core_types::{Amount, BidId, LeagueId, OrderId, PlayerId, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Auction,
    Listing,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Auction => "AUCTION",
            OrderType::Listing => "LISTING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AUCTION" => Some(OrderType::Auction),
            "LISTING" => Some(OrderType::Listing),
            _ => None,
        }
    }
}

/// Order lifecycle. `Open` orders accept bids; everything else is terminal
/// and the row is immutable from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    /// Expired without an award (no bids, unfunded winner, or listing
    /// resolution elsewhere).
    Closed,
    /// Settled by the auction sweep: ownership transferred, winner debited.
    Settled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Closed => "CLOSED",
            OrderStatus::Settled => "SETTLED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(OrderStatus::Open),
            "CLOSED" => Some(OrderStatus::Closed),
            "SETTLED" => Some(OrderStatus::Settled),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketOrder {
    pub order_id: OrderId,
    pub league_id: LeagueId,
    pub player_id: PlayerId,
    /// `None` means the player is a free agent auctioned off by the league.
    pub owner_team_id: Option<TeamId>,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub min_price: Amount,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bid {
    pub bid_id: BidId,
    pub order_id: OrderId,
    pub bidder_team_id: TeamId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful `place_bid`.
#[derive(Debug, Clone, Serialize)]
pub struct BidReceipt {
    pub bid_id: BidId,
    /// Extra budget newly reserved by this bid; 0 when the amount was
    /// already covered by the bidder's previous bid on the same order.
    pub reserved: Amount,
    /// The minimum the order would have accepted at placement time.
    pub min_required: Amount,
}

/// Result of one settlement sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepOutcome {
    /// Expired orders examined this sweep.
    pub processed: u64,
    /// Orders that ended in an award (`SETTLED`).
    pub settled: u64,
}

/// A completed ownership movement, as recorded in `transfer_history`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransferRecord {
    pub transfer_id: i64,
    pub league_id: LeagueId,
    pub player_id: PlayerId,
    pub from_team_id: Option<TeamId>,
    pub to_team_id: TeamId,
    pub amount: Amount,
    pub cause: String,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaceBidRequest {
    pub order_id: OrderId,
    pub bidder_team_id: TeamId,
    #[validate(range(min = 1))]
    pub amount: Amount,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateListingRequest {
    pub league_id: LeagueId,
    pub owner_team_id: TeamId,
    pub player_id: PlayerId,
    /// Defaults to the player's current market value when omitted.
    #[validate(range(min = 1))]
    pub min_price: Option<Amount>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAuctionRequest {
    pub league_id: LeagueId,
    /// `None` auctions a free agent.
    pub owner_team_id: Option<TeamId>,
    pub player_id: PlayerId,
    #[validate(range(min = 1))]
    pub min_price: Option<Amount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in [
            OrderStatus::Open,
            OrderStatus::Closed,
            OrderStatus::Settled,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("SOLD"), None);
    }

    #[test]
    fn order_type_round_trip() {
        for t in [OrderType::Auction, OrderType::Listing] {
            assert_eq!(OrderType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn zero_amount_bid_fails_validation() {
        use validator::Validate;
        let req = PlaceBidRequest {
            order_id: 1,
            bidder_team_id: 1,
            amount: 0,
        };
        assert!(req.validate().is_err());
    }
}

//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// League ID - one fantasy league, the scope of every market operation.
pub type LeagueId = i64;

/// Team ID - one manager account inside a league.
///
/// Primary key of `teams_tb`; every balance and reservation hangs off it.
pub type TeamId = i64;

/// Player ID - one player in the shared catalog.
pub type PlayerId = i64;

/// Market order ID - one listing or auction.
pub type OrderId = i64;

/// Bid ID - assigned by the store, monotonically increasing.
pub type BidId = i64;

/// Money amount in minor units (e.g. euro cents).
///
/// Balances, bids and prices are all `i64` minor units. Never floats;
/// additions on balance paths go through checked arithmetic.
pub type Amount = i64;

//! ligamarket - Fantasy League Transfer Market Engine
//!
//! The settlement core behind a fantasy league transfer market: listings
//! and auctions over scarce players, incremental bid reservations against
//! a shared finite budget, and a periodic sweep that closes expired
//! auctions and transfers ownership atomically. All coordination happens
//! through row-level and advisory locks on one PostgreSQL store, so any
//! number of instances can run side by side.
//!
//! # Modules
//!
//! - [`core_types`] - Id and amount aliases (TeamId, OrderId, etc.)
//! - [`store`] - Connection pool and schema bootstrap
//! - [`ledger`] - Budget ledger, the only path that moves realized money
//! - [`roster`] - Ownership store (one active holder per player)
//! - [`catalog`] - Player eligibility, valuation and league configuration
//! - [`market`] - Orders, bids, settlement, clause payments, events
//! - [`scheduler`] - Timer loop with advisory-locked jobs

pub mod catalog;
pub mod config;
pub mod core_types;
pub mod ledger;
pub mod logging;
pub mod market;
pub mod roster;
pub mod scheduler;
pub mod store;

// Convenient re-exports at crate root
pub use catalog::{DbCatalog, LeagueMarketConfig, PlayerCatalog};
pub use core_types::{Amount, BidId, LeagueId, OrderId, PlayerId, TeamId};
pub use ledger::{LedgerEntry, LedgerEntryType, LedgerService};
pub use market::bids::BidService;
pub use market::clause::ClauseService;
pub use market::error::MarketError;
pub use market::listing::ListingService;
pub use market::notify::{MarketEvent, MarketNotifier};
pub use market::settlement::SettlementService;
pub use market::types::{
    Bid, BidReceipt, CreateAuctionRequest, CreateListingRequest, MarketOrder, OrderStatus,
    OrderType, PlaceBidRequest, SweepOutcome, TransferRecord,
};
pub use roster::{RosterSlot, RosterStore, Slot};
pub use scheduler::Scheduler;
pub use store::Database;

//! Auction settlement - the periodic sweep that turns expired auctions
//! into ownership transfers.
//!
//! Each expired order settles in its own transaction: a failure leaves that
//! order `OPEN` for the next sweep and never rolls back orders already
//! committed. Idempotent by construction - a settled order is no longer
//! `OPEN`, so a second sweep simply finds nothing to do.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::core_types::{Amount, LeagueId, OrderId, TeamId};
use crate::ledger::{LedgerEntryType, LedgerService};
use crate::market::bids;
use crate::market::error::MarketError;
use crate::market::notify::{MarketEvent, MarketNotifier};
use crate::market::orders::OrderStore;
use crate::market::transfers::{TransferCause, TransferLog};
use crate::market::types::{MarketOrder, OrderStatus, SweepOutcome};
use crate::roster::RosterStore;

/// How a single order left the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettleResult {
    Awarded { winner: TeamId, amount: Amount },
    ClosedNoBids,
    /// Winner could no longer cover the bid; closed without award.
    ClosedUnfunded,
}

pub struct SettlementService {
    pool: PgPool,
    notifier: MarketNotifier,
}

impl SettlementService {
    pub fn new(pool: PgPool, notifier: MarketNotifier) -> Self {
        Self { pool, notifier }
    }

    /// Close every expired open auction in a league.
    ///
    /// Safe to run on every scheduler tick and on demand, from any number
    /// of instances at once: candidates are claimed with
    /// `FOR UPDATE SKIP LOCKED`, so workers never block on each other.
    pub async fn close_daily_auctions(
        &self,
        league_id: LeagueId,
        now: Option<DateTime<Utc>>,
    ) -> Result<SweepOutcome, MarketError> {
        let now = now.unwrap_or_else(Utc::now);
        let candidates = OrderStore::expired_auction_ids(&self.pool, league_id, now).await?;

        let mut outcome = SweepOutcome::default();
        if candidates.is_empty() {
            return Ok(outcome);
        }

        tracing::info!(league_id, candidates = candidates.len(), "Auction sweep starting");
        self.notifier.publish(MarketEvent::CycleStarted { league_id });

        for order_id in candidates {
            match self.settle_one(order_id, now).await {
                Ok(Some(result)) => {
                    outcome.processed += 1;
                    match result {
                        SettleResult::Awarded { winner, amount } => {
                            outcome.settled += 1;
                            self.notifier.publish(MarketEvent::OrderAwarded {
                                order_id,
                                winner_team_id: winner,
                                amount,
                            });
                        }
                        SettleResult::ClosedNoBids | SettleResult::ClosedUnfunded => {
                            self.notifier.publish(MarketEvent::OrderClosed { order_id });
                        }
                    }
                }
                // Claimed by a concurrent worker, or no longer eligible.
                Ok(None) => {}
                // The order stays OPEN and is retried next sweep.
                Err(e) => {
                    tracing::error!(order_id, error = %e, "Order settlement failed");
                }
            }
        }

        tracing::info!(
            league_id,
            processed = outcome.processed,
            settled = outcome.settled,
            "Auction sweep finished"
        );
        Ok(outcome)
    }

    /// Settle one order in its own transaction.
    async fn settle_one(
        &self,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Option<SettleResult>, MarketError> {
        let mut tx = self.pool.begin().await?;

        let Some(order) = OrderStore::claim_for_settlement(&mut tx, order_id, now).await? else {
            return Ok(None);
        };

        let all_bids = bids::load_bids(&mut tx, order_id).await?;
        let Some(winner_bid) = all_bids.first() else {
            OrderStore::set_status(&mut tx, order_id, OrderStatus::Closed).await?;
            tx.commit().await?;
            tracing::info!(order_id, "Auction closed with no bids");
            return Ok(Some(SettleResult::ClosedNoBids));
        };

        let winner_team = winner_bid.bidder_team_id;
        let win_amount = winner_bid.amount;
        let commitments = bids::bidder_commitments(&all_bids);
        let winner_held = commitments
            .iter()
            .find(|(team, _)| *team == winner_team)
            .map(|(_, held)| *held)
            .unwrap_or(0);

        let budget = bids::lock_team_budget(&mut tx, winner_team).await?;

        // The winner's own reservation backs this purchase, so it counts as
        // available here. Budget may still have moved since the bid (clause
        // payments only guard against a negative balance).
        let available_for_win = budget.remaining - (budget.reserved - winner_held);
        if available_for_win < win_amount {
            for (team, held) in &commitments {
                bids::adjust_reservation(&mut tx, *team, -*held).await?;
            }
            OrderStore::set_status(&mut tx, order_id, OrderStatus::Closed).await?;
            tx.commit().await?;
            tracing::warn!(
                order_id,
                winner_team,
                win_amount,
                available = available_for_win,
                "Winner can no longer fund the bid; closed without award"
            );
            return Ok(Some(SettleResult::ClosedUnfunded));
        }

        self.award(&mut tx, &order, winner_team, win_amount, winner_held, &commitments, now)
            .await?;
        tx.commit().await?;

        tracing::info!(order_id, winner_team, win_amount, "Auction settled");
        Ok(Some(SettleResult::Awarded {
            winner: winner_team,
            amount: win_amount,
        }))
    }

    /// Debit the winner, release every reservation, swap ownership.
    #[allow(clippy::too_many_arguments)]
    async fn award(
        &self,
        tx: &mut sqlx::PgConnection,
        order: &MarketOrder,
        winner_team: TeamId,
        win_amount: Amount,
        winner_held: Amount,
        commitments: &[(TeamId, Amount)],
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        // Reservation release precedes the debit so budget_remaining >=
        // budget_reserved holds at every step of the award.
        bids::adjust_reservation(&mut *tx, winner_team, -winner_held).await?;
        LedgerService::apply_delta(
            &mut *tx,
            winner_team,
            -win_amount,
            LedgerEntryType::AuctionWin,
            Some(serde_json::json!({
                "league_id": order.league_id,
                "player_id": order.player_id,
            })),
            Some(order.order_id),
        )
        .await?;

        // Losing bidders get back exactly what they themselves had held,
        // ascending team id.
        for (team, held) in commitments {
            if *team != winner_team {
                bids::adjust_reservation(&mut *tx, *team, -*held).await?;
            }
        }

        // Close whoever holds the player now; may be the seller, or nobody
        // for a free agent.
        let previous_owner =
            RosterStore::deactivate_active_slot(&mut *tx, order.league_id, order.player_id, now)
                .await?;
        RosterStore::insert_acquired_slot(
            &mut *tx,
            order.league_id,
            winner_team,
            order.player_id,
            win_amount,
            now,
        )
        .await?;

        TransferLog::append(
            &mut *tx,
            order.league_id,
            order.player_id,
            previous_owner.or(order.owner_team_id),
            winner_team,
            win_amount,
            TransferCause::AuctionWin,
            Some(order.order_id),
        )
        .await?;

        OrderStore::set_status(&mut *tx, order.order_id, OrderStatus::Settled).await?;
        Ok(())
    }
}

//! Clause payments - buying a player out of another team's roster by
//! paying the slot's release clause.
//!
//! Unlike auction wins, the price moves between two teams: the buyer is
//! debited and the seller credited, both through the ledger in the same
//! transaction as the ownership swap.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::catalog::PlayerCatalog;
use crate::core_types::{LeagueId, PlayerId, TeamId};
use crate::ledger::{LedgerEntryType, LedgerService};
use crate::market::error::MarketError;
use crate::market::transfers::{TransferCause, TransferLog};
use crate::market::types::TransferRecord;
use crate::roster::RosterStore;

pub struct ClauseService {
    pool: PgPool,
    catalog: Arc<dyn PlayerCatalog>,
}

impl ClauseService {
    pub fn new(pool: PgPool, catalog: Arc<dyn PlayerCatalog>) -> Self {
        Self { pool, catalog }
    }

    /// Pay a player's release clause and take the slot.
    ///
    /// The clause price is whatever the current slot carries; the new slot's
    /// clause is the amount just paid. The buyer-side debit only guards
    /// against a negative balance - by design it may leave the buyer's
    /// remaining budget below their open reservations, which auction
    /// settlement re-checks for exactly this reason.
    pub async fn pay_clause(
        &self,
        league_id: LeagueId,
        buyer_team_id: TeamId,
        player_id: PlayerId,
    ) -> Result<TransferRecord, MarketError> {
        self.catalog
            .assert_player_eligible(league_id, player_id)
            .await?;

        let now = Utc::now();

        // Peek without locks to learn the seller, so team rows can then be
        // locked in ascending id order (fixed discipline: teams before
        // roster). The slot is re-locked and re-checked below.
        let slot = RosterStore::active_slot(&self.pool, league_id, player_id)
            .await?
            .ok_or(MarketError::InvalidOwnership {
                team_id: buyer_team_id,
                player_id,
            })?;
        let seller_team_id = slot.team_id;
        if seller_team_id == buyer_team_id {
            return Err(MarketError::InvalidOwnership {
                team_id: buyer_team_id,
                player_id,
            });
        }

        let mut tx = self.pool.begin().await?;

        let mut team_order = [buyer_team_id, seller_team_id];
        team_order.sort_unstable();
        for team_id in team_order {
            crate::market::bids::lock_team_budget(&mut tx, team_id).await?;
        }

        let slot = RosterStore::lock_active_slot(&mut tx, league_id, player_id)
            .await?
            .filter(|s| s.team_id == seller_team_id)
            .ok_or(MarketError::InvalidOwnership {
                team_id: buyer_team_id,
                player_id,
            })?;

        if slot.locked_until.is_some_and(|until| until > now) {
            return Err(MarketError::PlayerLocked(player_id));
        }

        let price = slot.clause_value;
        let metadata = serde_json::json!({
            "league_id": league_id,
            "player_id": player_id,
            "counterparty": seller_team_id,
        });

        LedgerService::apply_delta(
            &mut tx,
            buyer_team_id,
            -price,
            LedgerEntryType::ClausePayment,
            Some(metadata.clone()),
            None,
        )
        .await?;
        LedgerService::apply_delta(
            &mut tx,
            seller_team_id,
            price,
            LedgerEntryType::Sale,
            Some(metadata),
            None,
        )
        .await?;

        RosterStore::deactivate_active_slot(&mut tx, league_id, player_id, now).await?;
        RosterStore::insert_acquired_slot(&mut tx, league_id, buyer_team_id, player_id, price, now)
            .await?;

        let record = TransferLog::append(
            &mut tx,
            league_id,
            player_id,
            Some(seller_team_id),
            buyer_team_id,
            price,
            TransferCause::ClausePayment,
            None,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            league_id,
            player_id,
            buyer_team_id,
            seller_team_id,
            price,
            "Clause paid"
        );
        Ok(record)
    }
}

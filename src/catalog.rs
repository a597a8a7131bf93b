//! Player catalog and league configuration lookups.
//!
//! The catalog is populated by ingestion jobs outside this engine; the
//! market only reads it. League source pools can be reconfigured between
//! actions, so eligibility is re-checked before every mutating operation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::core_types::{Amount, LeagueId, PlayerId};
use crate::market::error::MarketError;

/// Per-league market parameters consumed from the catalog.
#[derive(Debug, Clone)]
pub struct LeagueMarketConfig {
    pub league_id: LeagueId,
    pub source_pool: String,
    /// Offset of the league's local clock from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// Local wall-clock close time, "HH:MM".
    pub market_close_time: String,
    pub default_min_price: Amount,
}

#[async_trait]
pub trait PlayerCatalog: Send + Sync {
    /// Fail with `PlayerNotEligible` unless the player belongs to the
    /// league's configured source pool and is active in the catalog.
    async fn assert_player_eligible(
        &self,
        league_id: LeagueId,
        player_id: PlayerId,
    ) -> Result<(), MarketError>;

    /// Current market value, used as the default listing price.
    async fn player_value(&self, player_id: PlayerId) -> Result<Amount, MarketError>;

    async fn league_config(&self, league_id: LeagueId) -> Result<LeagueMarketConfig, MarketError>;
}

/// Catalog backed by `players_tb` / `leagues_tb`.
pub struct DbCatalog {
    pool: PgPool,
}

impl DbCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayerCatalog for DbCatalog {
    async fn assert_player_eligible(
        &self,
        league_id: LeagueId,
        player_id: PlayerId,
    ) -> Result<(), MarketError> {
        let row = sqlx::query(
            r#"SELECT p.status, p.source_pool, l.source_pool AS league_pool
               FROM players_tb p, leagues_tb l
               WHERE p.player_id = $1 AND l.league_id = $2"#,
        )
        .bind(player_id)
        .bind(league_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(MarketError::PlayerNotEligible(player_id));
        };

        let status: i16 = row.get("status");
        let player_pool: String = row.get("source_pool");
        let league_pool: String = row.get("league_pool");

        if status != 1 || player_pool != league_pool {
            return Err(MarketError::PlayerNotEligible(player_id));
        }
        Ok(())
    }

    async fn player_value(&self, player_id: PlayerId) -> Result<Amount, MarketError> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT market_value FROM players_tb WHERE player_id = $1")
                .bind(player_id)
                .fetch_optional(&self.pool)
                .await?;

        value.ok_or(MarketError::PlayerNotEligible(player_id))
    }

    async fn league_config(&self, league_id: LeagueId) -> Result<LeagueMarketConfig, MarketError> {
        let row = sqlx::query(
            r#"SELECT league_id, source_pool, utc_offset_minutes, market_close_time, default_min_price
               FROM leagues_tb WHERE league_id = $1"#,
        )
        .bind(league_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MarketError::InvalidInput(format!("unknown league {}", league_id)))?;

        Ok(LeagueMarketConfig {
            league_id: row.get("league_id"),
            source_pool: row.get("source_pool"),
            utc_offset_minutes: row.get("utc_offset_minutes"),
            market_close_time: row.get("market_close_time"),
            default_min_price: row.get("default_min_price"),
        })
    }
}

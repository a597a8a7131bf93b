//! Idempotent schema bootstrap for the market store.
//!
//! Every statement is `CREATE ... IF NOT EXISTS`, so running this on an
//! already-populated database is a no-op. Table conventions: `*_tb` for
//! live state, `*_history` for append-only audit rows.

use anyhow::Result;
use sqlx::PgPool;

pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing market schema...");

    for (name, ddl) in [
        ("leagues_tb", CREATE_LEAGUES_TABLE),
        ("players_tb", CREATE_PLAYERS_TABLE),
        ("teams_tb", CREATE_TEAMS_TABLE),
        ("ledger_tb", CREATE_LEDGER_TABLE),
        ("orders_tb", CREATE_ORDERS_TABLE),
        ("bids_tb", CREATE_BIDS_TABLE),
        ("roster_tb", CREATE_ROSTER_TABLE),
        ("roster_tb indexes", CREATE_ROSTER_INDEXES),
        ("transfer_history", CREATE_TRANSFER_HISTORY),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", name, e))?;
    }

    tracing::info!("Market schema initialized successfully");
    Ok(())
}

const CREATE_LEAGUES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS leagues_tb (
    league_id          BIGSERIAL PRIMARY KEY,
    name               TEXT NOT NULL,
    source_pool        TEXT NOT NULL,
    utc_offset_minutes INT NOT NULL DEFAULT 0,
    market_close_time  TEXT NOT NULL DEFAULT '20:00',
    default_min_price  BIGINT NOT NULL DEFAULT 100000,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_PLAYERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS players_tb (
    player_id    BIGSERIAL PRIMARY KEY,
    name         TEXT NOT NULL,
    source_pool  TEXT NOT NULL,
    market_value BIGINT NOT NULL DEFAULT 0,
    status       SMALLINT NOT NULL DEFAULT 1,
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TEAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS teams_tb (
    team_id          BIGSERIAL PRIMARY KEY,
    league_id        BIGINT NOT NULL REFERENCES leagues_tb(league_id),
    name             TEXT NOT NULL,
    budget_remaining BIGINT NOT NULL DEFAULT 0 CHECK (budget_remaining >= 0),
    budget_reserved  BIGINT NOT NULL DEFAULT 0 CHECK (budget_reserved >= 0),
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_LEDGER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_tb (
    entry_id      BIGSERIAL PRIMARY KEY,
    team_id       BIGINT NOT NULL REFERENCES teams_tb(team_id),
    entry_type    TEXT NOT NULL,
    delta         BIGINT NOT NULL,
    balance_after BIGINT NOT NULL,
    ref_id        BIGINT,
    metadata      JSONB,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders_tb (
    order_id      BIGSERIAL PRIMARY KEY,
    league_id     BIGINT NOT NULL REFERENCES leagues_tb(league_id),
    player_id     BIGINT NOT NULL REFERENCES players_tb(player_id),
    owner_team_id BIGINT REFERENCES teams_tb(team_id),
    order_type    TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'OPEN',
    min_price     BIGINT NOT NULL DEFAULT 0,
    opens_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    closes_at     TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_BIDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS bids_tb (
    bid_id         BIGSERIAL PRIMARY KEY,
    order_id       BIGINT NOT NULL REFERENCES orders_tb(order_id),
    bidder_team_id BIGINT NOT NULL REFERENCES teams_tb(team_id),
    amount         BIGINT NOT NULL CHECK (amount > 0),
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_ROSTER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS roster_tb (
    roster_id         BIGSERIAL PRIMARY KEY,
    league_id         BIGINT NOT NULL REFERENCES leagues_tb(league_id),
    team_id           BIGINT NOT NULL REFERENCES teams_tb(team_id),
    player_id         BIGINT NOT NULL REFERENCES players_tb(player_id),
    slot              TEXT NOT NULL DEFAULT 'BENCH',
    starter           BOOLEAN NOT NULL DEFAULT FALSE,
    active            BOOLEAN NOT NULL DEFAULT TRUE,
    acquisition_price BIGINT NOT NULL DEFAULT 0,
    clause_value      BIGINT NOT NULL DEFAULT 0,
    locked_until      TIMESTAMPTZ,
    valid_from        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    valid_to          TIMESTAMPTZ
)
"#;

// One active owner per (league, player). The partial unique index is the
// store-level backstop for the ownership-uniqueness invariant.
const CREATE_ROSTER_INDEXES: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS roster_active_owner_uq
    ON roster_tb (league_id, player_id) WHERE active
"#;

const CREATE_TRANSFER_HISTORY: &str = r#"
CREATE TABLE IF NOT EXISTS transfer_history (
    transfer_id  BIGSERIAL PRIMARY KEY,
    league_id    BIGINT NOT NULL,
    player_id    BIGINT NOT NULL,
    from_team_id BIGINT,
    to_team_id   BIGINT NOT NULL,
    amount       BIGINT NOT NULL,
    cause        TEXT NOT NULL,
    order_id     BIGINT,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

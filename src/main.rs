//! ligamarket - Fantasy League Transfer Market Engine
//!
//! Service entry point: loads configuration, connects the store, runs the
//! schema bootstrap, and drives the scheduler loop. The market services
//! themselves are a library contract; whatever transport sits above this
//! core calls them directly.

use std::sync::Arc;

use ligamarket::config::AppConfig;
use ligamarket::market::notify::MarketNotifier;
use ligamarket::market::settlement::SettlementService;
use ligamarket::scheduler::Scheduler;
use ligamarket::store::{Database, schema};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = ligamarket::logging::init_logging(&config);

    tracing::info!("Starting ligamarket engine in {} env", env);

    let postgres_url = config
        .postgres_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("postgres_url missing from config/{}.yaml", env))?;

    let db = Database::connect(postgres_url, &config.store).await?;
    db.health_check().await?;

    if config.store.init_schema {
        schema::init_schema(db.pool()).await?;
    }

    let notifier = MarketNotifier::default();
    let settlement = Arc::new(SettlementService::new(db.pool().clone(), notifier.clone()));

    if config.scheduler.enabled {
        let scheduler = Scheduler::new(db.pool().clone(), settlement, config.scheduler.tick_secs);
        tokio::select! {
            _ = scheduler.run() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
            }
        }
    } else {
        tracing::info!("Scheduler disabled; idling until shutdown");
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("ligamarket engine stopped");
    Ok(())
}

//! # Attendance API Main Entry Point
//!
//! This is the main entry point for the attendance service.

use anyhow::Context;
use attendance::{
    config::ConfigLoader,
    db::{init_pool, run_migrations},
    seeds::seed_subscriptions,
    server::run_server,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    config.validate()?;

    init_tracing(&config)?;
    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;
    run_migrations(&db).await?;

    if config.seed_subscriptions {
        let inserted = seed_subscriptions(&db)
            .await
            .context("Failed to seed subscription plans")?;
        tracing::info!(inserted, "Subscription plans seeded");
    }

    run_server(config, db).await
}

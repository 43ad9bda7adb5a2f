mod config;
mod db;
mod feed;
mod models;
mod processor;
mod push;
mod registry;
mod scheduler;

use config::AppConfig;
use feed::NwsFeedClient;
use processor::PollEngine;
use push::FcmClient;
use scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Weather Alert Engine...");

    // Init DB
    let pool = db::init_pool(&config.database_url).await?;
    info!("Connected to database");

    // External collaborators
    let feed = Arc::new(NwsFeedClient::new(&config)?);
    let gateway = Arc::new(FcmClient::new(&config)?);

    let engine = Arc::new(PollEngine::new(
        pool,
        feed,
        gateway,
        config.clone(),
    ));

    let scheduler = Scheduler::new(engine, Duration::from_secs(config.poll_interval_secs));
    scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.shutdown().await;

    Ok(())
}

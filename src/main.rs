use log::{error, info};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::model::{ApiContext, Journal, State};

mod api;
mod config;
mod desk;
mod metrics;
mod model;

fn main() -> Result<(), Box<dyn Error>> {
    // Read environment variables from .env
    dotenv::dotenv().ok();

    // Initialize logger from environment
    env_logger::init();

    // Parse config from environment
    let config = match envy::prefixed("APP_").from_env::<Config>() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to parse config: {}", e);
            return Ok(());
        }
    };

    // Create async runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(config.api_threads)
        .build()?;
    info!("Starting {} API threads", config.api_threads);

    let (tx, rx) = tokio::sync::mpsc::channel(32);

    let mut initial = State::new(config.starting_balance);
    initial.seed_superadmin(&config.superadmin_username, &config.superadmin_password);
    let state = Arc::new(RwLock::new(initial));

    let journal = Journal::open(&config.journal_location)?;
    let metrics = Arc::new(Metrics::new());

    // Spawn async API threads
    let context = ApiContext::new(tx, state.clone(), metrics.clone());
    let handle = rt.spawn(api::api(config, context));

    // Run the desk loop on the main thread
    desk::desk(&rt, rx, state, journal, metrics);
    rt.block_on(handle)?;

    Ok(())
}

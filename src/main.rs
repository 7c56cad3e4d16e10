use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use askdb::config::{AppConfig, CliArgs};
use askdb::db::pool::build_pool;
use askdb::db::seed;
use askdb::util::logging::init_tracing;
use askdb::web::{self, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = CliArgs::parse();
    let config = AppConfig::new(&args)?;
    for warning in config.validate() {
        warn!("{}", warning);
    }

    let pool = build_pool(&config.database)?;
    if config.database.seed_demo {
        if seed::seed_if_empty(&pool).await? {
            info!("seeded demo schema into an empty database");
        }
    }

    info!(
        database = %config.database.path,
        mode = %config.ai.mode,
        "starting askdb"
    );

    let state = Arc::new(AppState::new(config, pool)?);
    web::run_server(state).await?;
    Ok(())
}

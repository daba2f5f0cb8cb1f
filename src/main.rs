mod api;
mod config;
mod derivation;
mod error;
mod forecast;
mod loader;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::loader::load_records;
use crate::state::Dataset;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Load and derive once; every request reads this snapshot ---
    let records = load_records(&cfg.data_path)?;
    let dataset = Dataset::build(&records, cfg.period_order.clone())?;

    for insight in dataset.insights().values() {
        info!(
            event = "SEGMENT_INSIGHT",
            segment = %insight.segment,
            trend = %insight.trend_class,
            "{} | trend: {} | latest margin: {:.2}% | avg change: {:+.2} pts/quarter",
            insight.segment,
            insight.trend_class,
            insight.latest_margin_pct,
            insight.avg_margin_delta_pct,
        );
    }

    info!("Segments: {}", dataset.segments().join(", "));

    // --- HTTP API ---
    let api_state = ApiState {
        dataset,
        health: Arc::new(HealthState::new()),
        data_path: cfg.data_path.clone(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

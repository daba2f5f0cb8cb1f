//! Shared health state for the /health endpoint.
//! Counters are bumped by the forecast handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::state::Dataset;

/// Request counters. Updated by handlers, read by /health.
pub struct HealthState {
    started_at: Instant,
    forecasts_served: AtomicU64,
    forecasts_rejected: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            forecasts_served: AtomicU64::new(0),
            forecasts_rejected: AtomicU64::new(0),
        }
    }

    pub fn inc_forecasts_served(&self) {
        self.forecasts_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_forecasts_rejected(&self) {
        self.forecasts_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forecasts_served(&self) -> u64 {
        self.forecasts_served.load(Ordering::Relaxed)
    }

    pub fn forecasts_rejected(&self) -> u64 {
        self.forecasts_rejected.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub data_path: String,
    pub records: usize,
    pub segments: usize,
    pub periods: usize,
    pub margin_drops: usize,
    pub forecasts_served: u64,
    pub forecasts_rejected: u64,
    pub uptime_secs: u64,
}

impl HealthResponse {
    pub fn snapshot(health: &HealthState, dataset: &Dataset, data_path: &str) -> Self {
        Self {
            status: "ok",
            data_path: data_path.to_string(),
            records: dataset.record_count(),
            segments: dataset.insights().len(),
            periods: dataset.period_order().len(),
            margin_drops: dataset.drop_count(),
            forecasts_served: health.forecasts_served(),
            forecasts_rejected: health.forecasts_rejected(),
            uptime_secs: health.uptime_secs(),
        }
    }
}

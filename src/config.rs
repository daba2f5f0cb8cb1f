use std::collections::HashSet;

use crate::error::{AppError, Result};

pub const DATA_PATH: &str = "data/segment_financials.csv";

/// Fiscal calendar of the bundled dataset, oldest first.
pub const DEFAULT_PERIOD_ORDER: &[&str] = &[
    "Q1 FY23", "Q2 FY23", "Q3 FY23", "Q4 FY23",
    "Q1 FY24", "Q2 FY24", "Q3 FY24", "Q4 FY24",
];

/// A period-over-period margin change strictly below this is flagged as a drop.
pub const MARGIN_DROP_THRESHOLD_PCT: f64 = -2.5;

/// Average margin deltas inside (-STABLE_BAND_PCT, STABLE_BAND_PCT) classify as stable.
pub const STABLE_BAND_PCT: f64 = 1.0;

/// Forecast simulator control bounds. Enforced by the API, not by the engine.
pub mod forecast_bounds {
    pub const GROWTH_RATE_MIN_PCT: f64 = -10.0;
    pub const GROWTH_RATE_MAX_PCT: f64 = 15.0;
    pub const HORIZON_MAX: i64 = 4;
    pub const DEFAULT_HORIZON: i64 = 2;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Delimited input file (DATA_PATH)
    pub data_path: String,
    pub api_port: u16,
    /// Chronological period labels (PERIOD_ORDER, comma-separated).
    /// Example: "Q1 FY23,Q2 FY23,Q3 FY23"
    pub period_order: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let period_order = match lookup("PERIOD_ORDER") {
            Some(raw) => parse_period_order(&raw)?,
            None => DEFAULT_PERIOD_ORDER.iter().map(|p| p.to_string()).collect(),
        };

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            data_path: lookup("DATA_PATH").unwrap_or_else(|| DATA_PATH.to_string()),
            api_port: lookup("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            period_order,
        })
    }
}

fn parse_period_order(raw: &str) -> Result<Vec<String>> {
    let labels: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if labels.is_empty() {
        return Err(AppError::Config("PERIOD_ORDER must list at least one period".to_string()));
    }

    let mut seen = HashSet::new();
    for label in &labels {
        if !seen.insert(label.as_str()) {
            return Err(AppError::Config(format!("PERIOD_ORDER lists '{label}' twice")));
        }
    }

    Ok(labels)
}

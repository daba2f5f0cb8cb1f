use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::debug;

use crate::api::health::{HealthResponse, HealthState};
use crate::config::forecast_bounds::{
    DEFAULT_HORIZON, GROWTH_RATE_MAX_PCT, GROWTH_RATE_MIN_PCT, HORIZON_MAX,
};
use crate::error::{AppError, Result};
use crate::state::Dataset;
use crate::types::{EnrichedRecord, ForecastResult, SegmentInsight};

#[derive(Clone)]
pub struct ApiState {
    pub dataset: Arc<Dataset>,
    pub health: Arc<HealthState>,
    pub data_path: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/periods", get(get_periods))
        .route("/records", get(get_records))
        .route("/insights", get(get_insights))
        .route("/segments/:segment/forecast", get(get_forecast))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    pub segment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    /// Growth override in percent. Falls back to the segment's history.
    pub growth_pct: Option<f64>,
    pub horizon: Option<i64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse::snapshot(&state.health, &state.dataset, &state.data_path))
}

async fn get_periods(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.dataset.period_order().to_vec())
}

async fn get_records(
    State(state): State<ApiState>,
    Query(params): Query<RecordsQuery>,
) -> Result<Json<Vec<EnrichedRecord>>> {
    select_records(&state.dataset, &params).map(Json)
}

async fn get_insights(State(state): State<ApiState>) -> Json<Vec<SegmentInsight>> {
    Json(state.dataset.insights().values().cloned().collect())
}

async fn get_forecast(
    State(state): State<ApiState>,
    Path(segment): Path<String>,
    Query(params): Query<ForecastQuery>,
) -> Result<Json<ForecastResult>> {
    match run_forecast(&state.dataset, &segment, &params) {
        Ok(forecast) => {
            state.health.inc_forecasts_served();
            debug!(
                segment = %forecast.segment,
                growth_pct = forecast.applied_growth_pct,
                horizon = forecast.horizon,
                "forecast served"
            );
            Ok(Json(forecast))
        }
        Err(e) => {
            state.health.inc_forecasts_rejected();
            debug!(segment = %segment, "forecast rejected: {e}");
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub fn select_records(dataset: &Dataset, params: &RecordsQuery) -> Result<Vec<EnrichedRecord>> {
    if let Some(segment) = params.segment.as_deref() {
        if !dataset.insights().contains_key(segment) {
            return Err(AppError::UnknownSegment(segment.to_string()));
        }
    }
    Ok(dataset
        .records(params.segment.as_deref())
        .into_iter()
        .cloned()
        .collect())
}

/// Apply the simulator's control bounds, then forecast.
/// Non-positive horizons are left for the engine to reject.
pub fn run_forecast(dataset: &Dataset, segment: &str, params: &ForecastQuery) -> Result<ForecastResult> {
    let horizon = params.horizon.unwrap_or(DEFAULT_HORIZON);
    if horizon > HORIZON_MAX {
        return Err(AppError::InvalidQuery(format!(
            "horizon must be at most {HORIZON_MAX}, got {horizon}"
        )));
    }

    if let Some(g) = params.growth_pct {
        if !g.is_finite() || !(GROWTH_RATE_MIN_PCT..=GROWTH_RATE_MAX_PCT).contains(&g) {
            return Err(AppError::InvalidQuery(format!(
                "growth_pct must be within {GROWTH_RATE_MIN_PCT}..={GROWTH_RATE_MAX_PCT}, got {g}"
            )));
        }
    }

    dataset.forecast(segment, params.growth_pct, horizon)
}

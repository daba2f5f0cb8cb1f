use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::derivation::{derive, summarize};
use crate::error::{AppError, EngineError, Result};
use crate::forecast::{project, trailing_growth_rate};
use crate::types::{EnrichedRecord, FinancialRecord, ForecastResult, SegmentInsight};

/// Derived view of one load of the input table.
///
/// Built once and shared read-only; rebuilding from the same rows yields an
/// identical snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    period_order: Vec<String>,
    records: Vec<EnrichedRecord>,
    insights: BTreeMap<String, SegmentInsight>,
}

impl Dataset {
    pub fn build(records: &[FinancialRecord], period_order: Vec<String>) -> std::result::Result<Arc<Self>, EngineError> {
        let enriched = derive(records, &period_order)?;
        let insights = summarize(&enriched);

        for row in enriched.iter().filter(|r| r.drop_flag) {
            warn!(
                event = "MARGIN_DROP",
                segment = %row.segment(),
                period = %row.period(),
                delta = row.margin_delta_pct.unwrap_or_default(),
                "MARGIN DROP | {} {} | {:+.2} pts",
                row.segment(),
                row.period(),
                row.margin_delta_pct.unwrap_or_default(),
            );
        }

        let dataset = Self {
            period_order,
            records: enriched,
            insights,
        };
        info!(
            "Dataset ready: {} segments over {} periods, {} margin drops",
            dataset.insights.len(),
            dataset.period_order.len(),
            dataset.drop_count(),
        );
        Ok(Arc::new(dataset))
    }

    pub fn period_order(&self) -> &[String] {
        &self.period_order
    }

    /// Enriched rows in segment then period order, optionally for one segment.
    pub fn records(&self, segment: Option<&str>) -> Vec<&EnrichedRecord> {
        self.records
            .iter()
            .filter(|r| segment.map_or(true, |s| r.segment() == s))
            .collect()
    }

    pub fn insights(&self) -> &BTreeMap<String, SegmentInsight> {
        &self.insights
    }

    /// Segment names in name order.
    pub fn segments(&self) -> Vec<&str> {
        self.insights.keys().map(String::as_str).collect()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn drop_count(&self) -> usize {
        self.records.iter().filter(|r| r.drop_flag).count()
    }

    /// Period-ordered revenue of one segment.
    pub fn revenue_series(&self, segment: &str) -> Result<Vec<f64>> {
        if !self.insights.contains_key(segment) {
            return Err(AppError::UnknownSegment(segment.to_string()));
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.segment() == segment)
            .map(|r| r.record.revenue)
            .collect())
    }

    /// Project a segment's last revenue forward.
    ///
    /// Uses `growth_override_pct` when given, otherwise the segment's trailing
    /// average growth. Without an override the history must support a rate.
    pub fn forecast(
        &self,
        segment: &str,
        growth_override_pct: Option<f64>,
        horizon: i64,
    ) -> Result<ForecastResult> {
        let series = self.revenue_series(segment)?;
        let last_revenue = match series.last() {
            Some(v) => *v,
            None => return Err(AppError::UnknownSegment(segment.to_string())),
        };

        let historical = trailing_growth_rate(&series).map(|rate| rate * 100.0);
        let applied_growth_pct = match (growth_override_pct, &historical) {
            (Some(g), _) => g,
            (None, Ok(h)) => *h,
            (None, Err(e)) => return Err(e.clone().into()),
        };

        let values = project(last_revenue, applied_growth_pct, horizon)?;

        Ok(ForecastResult {
            segment: segment.to_string(),
            last_revenue,
            historical_growth_pct: historical.ok(),
            applied_growth_pct,
            horizon: values.len(),
            values,
        })
    }
}

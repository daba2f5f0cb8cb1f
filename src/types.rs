use serde::{Deserialize, Serialize};

use crate::config::STABLE_BAND_PCT;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One segment/period observation as read from the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub segment: String,
    pub period: String,
    /// Revenue in billions.
    pub revenue: f64,
    pub gross_margin_pct: f64,
}

/// A record plus the fields derived from its segment's period-ordered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: FinancialRecord,
    /// Change from the segment's previous period. None for the first period.
    pub margin_delta_pct: Option<f64>,
    pub drop_flag: bool,
}

impl EnrichedRecord {
    pub fn segment(&self) -> &str {
        &self.record.segment
    }

    pub fn period(&self) -> &str {
        &self.record.period
    }
}

// ---------------------------------------------------------------------------
// Trend classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendClass {
    Declining,
    Improving,
    Stable,
}

impl TrendClass {
    pub fn from_avg_delta(avg_delta_pct: f64) -> Self {
        if avg_delta_pct.abs() < STABLE_BAND_PCT {
            TrendClass::Stable
        } else if avg_delta_pct > 0.0 {
            TrendClass::Improving
        } else {
            TrendClass::Declining
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            TrendClass::Declining => "review cost structure or pricing strategy",
            TrendClass::Improving => "consider increasing go-to-market investment to sustain momentum",
            TrendClass::Stable => "monitor for potential volatility",
        }
    }
}

impl std::fmt::Display for TrendClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendClass::Declining => "declining",
            TrendClass::Improving => "improving",
            TrendClass::Stable => "stable",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInsight {
    pub segment: String,
    pub trend_class: TrendClass,
    pub latest_margin_pct: f64,
    /// Mean of the defined margin deltas; 0 when the segment has a single period.
    pub avg_margin_delta_pct: f64,
    pub recommendation: String,
}

/// Constant-rate projection for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub segment: String,
    pub last_revenue: f64,
    /// Trailing average growth in percent. None when the segment has one period.
    pub historical_growth_pct: Option<f64>,
    pub applied_growth_pct: f64,
    pub horizon: usize,
    /// Projected revenue for periods 1..=horizon ahead.
    pub values: Vec<f64>,
}

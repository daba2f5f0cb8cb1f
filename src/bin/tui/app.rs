use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror the server's JSON shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RecordResponse {
    pub segment: String,
    pub period: String,
    pub revenue: f64,
    pub gross_margin_pct: f64,
    pub margin_delta_pct: Option<f64>,
    pub drop_flag: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightResponse {
    pub segment: String,
    pub trend_class: String,
    pub latest_margin_pct: f64,
    pub avg_margin_delta_pct: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    pub last_revenue: f64,
    pub historical_growth_pct: Option<f64>,
    pub applied_growth_pct: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// Simulator controls
// ---------------------------------------------------------------------------

pub const GROWTH_MIN_PCT: f64 = -10.0;
pub const GROWTH_MAX_PCT: f64 = 15.0;
pub const GROWTH_STEP_PCT: f64 = 0.5;
pub const HORIZON_MIN: i64 = 1;
pub const HORIZON_MAX: i64 = 4;
pub const DEFAULT_HORIZON: i64 = 2;

pub fn step_growth(current: f64, delta: f64) -> f64 {
    (current + delta).clamp(GROWTH_MIN_PCT, GROWTH_MAX_PCT)
}

pub fn step_horizon(current: i64, delta: i64) -> i64 {
    (current + delta).clamp(HORIZON_MIN, HORIZON_MAX)
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    MarginTrends,
    RevenueTrends,
    Forecast,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::MarginTrends, Tab::RevenueTrends, Tab::Forecast];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::MarginTrends => "Margin Trends",
            Tab::RevenueTrends => "Revenue Trends",
            Tab::Forecast => "Forecast Simulator",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Tab::MarginTrends => 0,
            Tab::RevenueTrends => 1,
            Tab::Forecast => 2,
        }
    }

    pub fn next(&self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub tab: Tab,
    pub periods: Vec<String>,
    pub records: Vec<RecordResponse>,
    pub insights: Vec<InsightResponse>,
    pub selected: usize,
    /// Simulator growth control. None until seeded from the segment's history.
    pub growth_pct: Option<f64>,
    pub horizon: i64,
    pub forecast: Option<ForecastResponse>,
    pub forecast_error: Option<String>,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            tab: Tab::MarginTrends,
            periods: Vec::new(),
            records: Vec::new(),
            insights: Vec::new(),
            selected: 0,
            growth_pct: None,
            horizon: DEFAULT_HORIZON,
            forecast: None,
            forecast_error: None,
            base_url,
        }
    }

    pub fn selected_segment(&self) -> Option<&str> {
        self.insights.get(self.selected).map(|i| i.segment.as_str())
    }

    pub fn select(&mut self, index: usize) {
        let max = self.insights.len().saturating_sub(1);
        let index = index.min(max);
        if index != self.selected {
            self.selected = index;
            self.growth_pct = None;
            self.forecast = None;
        }
    }

    pub fn drop_count(&self) -> usize {
        self.records.iter().filter(|r| r.drop_flag).count()
    }

    /// Per-segment (x, y) points for a chart, x being the period's position.
    pub fn chart_series(&self, value: impl Fn(&RecordResponse) -> f64) -> Vec<(String, Vec<(f64, f64)>)> {
        self.insights
            .iter()
            .map(|insight| {
                let points = self
                    .records
                    .iter()
                    .filter(|r| r.segment == insight.segment)
                    .filter_map(|r| {
                        self.periods
                            .iter()
                            .position(|p| *p == r.period)
                            .map(|x| (x as f64, value(r)))
                    })
                    .collect();
                (insight.segment.clone(), points)
            })
            .collect()
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let periods_url = format!("{}/periods", self.base_url);
        let records_url = format!("{}/records", self.base_url);
        let insights_url = format!("{}/insights", self.base_url);

        let (periods_res, records_res, insights_res) = tokio::join!(
            client.get(&periods_url).send(),
            client.get(&records_url).send(),
            client.get(&insights_url).send(),
        );

        let (periods_resp, records_resp, insights_resp) = match (periods_res, records_res, insights_res) {
            (Ok(p), Ok(r), Ok(i)) => (p, r, i),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };

        let (periods, records, insights) = tokio::join!(
            periods_resp.json::<Vec<String>>(),
            records_resp.json::<Vec<RecordResponse>>(),
            insights_resp.json::<Vec<InsightResponse>>(),
        );

        match (periods, records, insights) {
            (Ok(p), Ok(r), Ok(i)) => {
                self.periods = p;
                self.records = r;
                self.insights = i;
                self.status = ConnectionStatus::Connected;
                self.select(self.selected);
                self.refresh_forecast(client).await;
            }
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }

    /// Fetch the projection for the selected segment with the current controls.
    /// The first fetch for a segment omits the growth override and seeds the
    /// control from the segment's historical rate. When the seeded control
    /// differs from the rate the server applied, fetch again with the control's
    /// value so the listed forecast always matches the control.
    pub async fn refresh_forecast(&mut self, client: &reqwest::Client) {
        if self.selected_segment().is_none() {
            return;
        }
        for _ in 0..2 {
            match self.fetch_forecast(client).await {
                Ok(f) => {
                    if !self.accept_forecast(f) {
                        return;
                    }
                }
                Err(message) => {
                    if self.growth_pct.is_none() {
                        self.growth_pct = Some(0.0);
                    }
                    self.forecast = None;
                    self.forecast_error = Some(message);
                    return;
                }
            }
        }
    }

    async fn fetch_forecast(&self, client: &reqwest::Client) -> Result<ForecastResponse, String> {
        let segment = self
            .selected_segment()
            .ok_or_else(|| "no segment selected".to_string())?;
        let url = forecast_url(&self.base_url, segment, self.growth_pct, self.horizon)?;

        let resp = client.get(url).send().await.map_err(|e| format!("{e}"))?;
        let status = resp.status();
        if status.is_success() {
            resp.json::<ForecastResponse>()
                .await
                .map_err(|e| format!("parse error: {e}"))
        } else {
            Err(resp
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string()))
        }
    }

    /// Store a fetched forecast, seeding the growth control on first sight of
    /// a segment. Returns true when the seeded control differs from the rate
    /// the forecast was computed at; the forecast is then discarded.
    pub fn accept_forecast(&mut self, forecast: ForecastResponse) -> bool {
        if self.growth_pct.is_none() {
            let seeded = seed_growth(forecast.historical_growth_pct);
            self.growth_pct = Some(seeded);
            if (seeded - forecast.applied_growth_pct).abs() > 1e-9 {
                self.forecast = None;
                return true;
            }
        }
        self.forecast = Some(forecast);
        self.forecast_error = None;
        false
    }
}

pub fn forecast_url(base_url: &str, segment: &str, growth_pct: Option<f64>, horizon: i64) -> Result<reqwest::Url, String> {
    let mut url = reqwest::Url::parse(base_url).map_err(|e| format!("bad API_URL: {e}"))?;
    url.path_segments_mut()
        .map_err(|_| "API_URL cannot be a base".to_string())?
        .pop_if_empty()
        .extend(["segments", segment, "forecast"]);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("horizon", &horizon.to_string());
        if let Some(g) = growth_pct {
            query.append_pair("growth_pct", &format!("{g:.2}"));
        }
    }
    Ok(url)
}

/// Historical rate clamped to the control's range and rounded to the 0.01
/// precision `forecast_url` sends; 0 when there is no history.
pub fn seed_growth(historical_pct: Option<f64>) -> f64 {
    historical_pct
        .filter(|g| g.is_finite())
        .map_or(0.0, |g| round_growth(g.clamp(GROWTH_MIN_PCT, GROWTH_MAX_PCT)))
}

fn round_growth(pct: f64) -> f64 {
    (pct * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_delta(delta: Option<f64>) -> String {
    match delta {
        Some(d) => format!("{d:+.2}"),
        None => "—".to_string(),
    }
}

pub fn format_forecast_line(k: usize, value: f64) -> String {
    format!("Q{k} Forecast: ${value:.2}B")
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insight(segment: &str) -> InsightResponse {
        InsightResponse {
            segment: segment.to_string(),
            trend_class: "stable".to_string(),
            latest_margin_pct: 50.0,
            avg_margin_delta_pct: 0.0,
            recommendation: "monitor for potential volatility".to_string(),
        }
    }

    fn record(segment: &str, period: &str, revenue: f64) -> RecordResponse {
        RecordResponse {
            segment: segment.to_string(),
            period: period.to_string(),
            revenue,
            gross_margin_pct: 50.0,
            margin_delta_pct: None,
            drop_flag: false,
        }
    }

    #[test]
    fn controls_clamp_to_slider_range() {
        assert_eq!(step_growth(14.8, GROWTH_STEP_PCT), 15.0);
        assert_eq!(step_growth(-9.8, -GROWTH_STEP_PCT), -10.0);
        assert_eq!(step_horizon(4, 1), 4);
        assert_eq!(step_horizon(1, -1), 1);
        assert_eq!(step_horizon(2, 1), 3);
    }

    #[test]
    fn seed_growth_clamps_history() {
        assert_eq!(seed_growth(Some(22.0)), 15.0);
        assert_eq!(seed_growth(Some(3.25)), 3.25);
        assert_eq!(seed_growth(Some(2.873456)), 2.87);
        assert_eq!(seed_growth(None), 0.0);
    }

    fn forecast(historical: Option<f64>, applied: f64) -> ForecastResponse {
        ForecastResponse {
            last_revenue: 100.0,
            historical_growth_pct: historical,
            applied_growth_pct: applied,
            values: vec![100.0 * (1.0 + applied / 100.0)],
        }
    }

    #[test]
    fn out_of_range_history_is_refetched_at_the_clamped_rate() {
        let mut app = AppState::new("http://localhost:3000".to_string());

        assert!(app.accept_forecast(forecast(Some(22.0), 22.0)));
        assert_eq!(app.growth_pct, Some(15.0));
        assert!(app.forecast.is_none());

        // second fetch carries growth_pct=15.00
        assert!(!app.accept_forecast(forecast(Some(22.0), 15.0)));
        let shown = app.forecast.as_ref().unwrap();
        assert_eq!(shown.applied_growth_pct, app.growth_pct.unwrap());
    }

    #[test]
    fn in_range_history_is_kept_without_refetch() {
        let mut app = AppState::new("http://localhost:3000".to_string());
        assert!(!app.accept_forecast(forecast(Some(4.5), 4.5)));
        assert_eq!(app.growth_pct, Some(4.5));
        assert!(app.forecast.is_some());
    }

    #[test]
    fn unrounded_history_is_refetched_at_the_sent_precision() {
        let mut app = AppState::new("http://localhost:3000".to_string());
        assert!(app.accept_forecast(forecast(Some(2.873456), 2.873456)));
        assert_eq!(app.growth_pct, Some(2.87));
    }

    #[test]
    fn later_fetches_keep_the_user_control() {
        let mut app = AppState::new("http://localhost:3000".to_string());
        app.growth_pct = Some(-3.0);
        assert!(!app.accept_forecast(forecast(Some(8.0), -3.0)));
        assert_eq!(app.growth_pct, Some(-3.0));
    }

    #[test]
    fn tabs_cycle() {
        assert_eq!(Tab::MarginTrends.next(), Tab::RevenueTrends);
        assert_eq!(Tab::Forecast.next(), Tab::MarginTrends);
    }

    #[test]
    fn changing_segment_resets_growth_control() {
        let mut app = AppState::new("http://localhost:3000".to_string());
        app.insights = vec![insight("A"), insight("B")];
        app.growth_pct = Some(4.0);

        app.select(5);
        assert_eq!(app.selected, 1);
        assert_eq!(app.selected_segment(), Some("B"));
        assert!(app.growth_pct.is_none());
    }

    #[test]
    fn chart_series_uses_period_positions() {
        let mut app = AppState::new("http://localhost:3000".to_string());
        app.periods = vec!["Q1".to_string(), "Q2".to_string()];
        app.insights = vec![insight("A")];
        app.records = vec![record("A", "Q2", 2.0), record("A", "Q1", 1.0), record("B", "Q1", 9.0)];

        let series = app.chart_series(|r| r.revenue);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].1, vec![(1.0, 2.0), (0.0, 1.0)]);
    }

    #[test]
    fn forecast_url_encodes_segment() {
        let url = forecast_url("http://localhost:3000", "Digital Media", Some(2.5), 3).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/segments/Digital%20Media/forecast?horizon=3&growth_pct=2.50"
        );
        let url = forecast_url("http://localhost:3000", "A", None, 2).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/segments/A/forecast?horizon=2");
    }

    #[test]
    fn formatting() {
        assert_eq!(format_delta(Some(-4.0)), "-4.00");
        assert_eq!(format_delta(Some(5.0)), "+5.00");
        assert_eq!(format_delta(None), "—");
        assert_eq!(format_forecast_line(1, 4.2871), "Q1 Forecast: $4.29B");
        assert_eq!(capitalize("declining"), "Declining");
        assert_eq!(truncate("Publishing and Advertising", 10), "Publishin…");
    }
}

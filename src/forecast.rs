use crate::error::EngineError;

/// Mean period-over-period fractional change of `revenue_series` (0.10 = 10%).
pub fn trailing_growth_rate(revenue_series: &[f64]) -> Result<f64, EngineError> {
    if revenue_series.len() < 2 {
        return Err(EngineError::InsufficientHistory {
            observed: revenue_series.len(),
        });
    }

    let mut total = 0.0;
    for (i, pair) in revenue_series.windows(2).enumerate() {
        let (prev, curr) = (pair[0], pair[1]);
        if prev == 0.0 {
            return Err(EngineError::DivisionByZero { index: i + 1 });
        }
        total += (curr - prev) / prev;
    }

    Ok(total / (revenue_series.len() - 1) as f64)
}

/// Compound `last_value` forward at a constant rate for `horizon` periods.
/// Returns the projected values for periods 1..=horizon.
pub fn project(last_value: f64, growth_rate_pct: f64, horizon: i64) -> Result<Vec<f64>, EngineError> {
    if horizon <= 0 {
        return Err(EngineError::InvalidHorizon(horizon));
    }

    let factor = 1.0 + growth_rate_pct / 100.0;
    let mut value = last_value;
    let values: Vec<f64> = (0..horizon)
        .map(|_| {
            value *= factor;
            value
        })
        .collect();

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "actual={actual:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "actual={actual:?} expected={expected:?}");
        }
    }

    #[test]
    fn ten_percent_compounds() {
        assert_close(&project(100.0, 10.0, 2).unwrap(), &[110.0, 121.0]);
    }

    #[test]
    fn zero_growth_is_flat() {
        assert_close(&project(100.0, 0.0, 3).unwrap(), &[100.0, 100.0, 100.0]);
    }

    #[test]
    fn negative_growth_shrinks() {
        assert_close(&project(200.0, -10.0, 2).unwrap(), &[180.0, 162.0]);
    }

    #[test]
    fn horizon_beyond_ui_bounds_is_accepted() {
        assert_eq!(project(1.0, 1.0, 12).unwrap().len(), 12);
    }

    #[test]
    fn non_positive_horizon_is_rejected() {
        assert_eq!(project(100.0, 5.0, 0), Err(EngineError::InvalidHorizon(0)));
        assert_eq!(project(100.0, 5.0, -3), Err(EngineError::InvalidHorizon(-3)));
    }

    #[test]
    fn projection_is_repeatable() {
        assert_eq!(project(4.27, 3.3, 4).unwrap(), project(4.27, 3.3, 4).unwrap());
    }

    #[test]
    fn steady_ten_percent_history() {
        let rate = trailing_growth_rate(&[100.0, 110.0, 121.0]).unwrap();
        assert!((rate - 0.10).abs() < 1e-9, "rate={rate}");
    }

    #[test]
    fn mixed_history_averages_steps() {
        // +20% then -10%
        let rate = trailing_growth_rate(&[50.0, 60.0, 54.0]).unwrap();
        assert!((rate - 0.05).abs() < 1e-9, "rate={rate}");
    }

    #[test]
    fn single_observation_is_insufficient() {
        assert_eq!(
            trailing_growth_rate(&[5.0]),
            Err(EngineError::InsufficientHistory { observed: 1 })
        );
        assert_eq!(
            trailing_growth_rate(&[]),
            Err(EngineError::InsufficientHistory { observed: 0 })
        );
    }

    #[test]
    fn zero_base_is_rejected() {
        assert_eq!(
            trailing_growth_rate(&[1.0, 0.0, 2.0]),
            Err(EngineError::DivisionByZero { index: 2 })
        );
    }
}

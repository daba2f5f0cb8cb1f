use std::collections::BTreeMap;

use crate::types::{EnrichedRecord, SegmentInsight, TrendClass};

/// Build one insight per segment from `derive` output.
///
/// Rows are expected in each segment's period order. A segment with a single
/// period has no deltas and is reported as stable with an average of 0.
pub fn summarize(enriched: &[EnrichedRecord]) -> BTreeMap<String, SegmentInsight> {
    let mut grouped: BTreeMap<&str, Vec<&EnrichedRecord>> = BTreeMap::new();
    for row in enriched {
        grouped.entry(row.segment()).or_default().push(row);
    }

    grouped
        .into_iter()
        .filter_map(|(segment, rows)| {
            let last = rows.last()?;
            let insight = segment_insight(segment, last.record.gross_margin_pct, &rows);
            Some((segment.to_string(), insight))
        })
        .collect()
}

fn segment_insight(segment: &str, latest_margin_pct: f64, rows: &[&EnrichedRecord]) -> SegmentInsight {
    let deltas: Vec<f64> = rows.iter().filter_map(|r| r.margin_delta_pct).collect();
    let avg_margin_delta_pct = if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    };
    let trend_class = TrendClass::from_avg_delta(avg_margin_delta_pct);

    SegmentInsight {
        segment: segment.to_string(),
        trend_class,
        latest_margin_pct,
        avg_margin_delta_pct,
        recommendation: trend_class.recommendation().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::derive;
    use crate::types::FinancialRecord;

    fn order() -> Vec<String> {
        ["P1", "P2", "P3", "P4"].iter().map(|p| p.to_string()).collect()
    }

    fn series(segment: &str, margins: &[f64]) -> Vec<FinancialRecord> {
        margins
            .iter()
            .enumerate()
            .map(|(i, m)| FinancialRecord {
                segment: segment.to_string(),
                period: format!("P{}", i + 1),
                revenue: 1.0,
                gross_margin_pct: *m,
            })
            .collect()
    }

    #[test]
    fn small_net_change_is_stable() {
        let enriched = derive(&series("A", &[20.0, 25.0, 21.0]), &order()).unwrap();
        let insights = summarize(&enriched);
        let a = &insights["A"];

        assert!((a.avg_margin_delta_pct - 0.5).abs() < 1e-9);
        assert_eq!(a.trend_class, TrendClass::Stable);
        assert_eq!(a.latest_margin_pct, 21.0);
        assert_eq!(a.recommendation, "monitor for potential volatility");
    }

    #[test]
    fn rising_margins_are_improving() {
        let enriched = derive(&series("A", &[60.0, 62.0, 64.5]), &order()).unwrap();
        let a = &summarize(&enriched)["A"];

        assert!((a.avg_margin_delta_pct - 2.25).abs() < 1e-9);
        assert_eq!(a.trend_class, TrendClass::Improving);
        assert_eq!(
            a.recommendation,
            "consider increasing go-to-market investment to sustain momentum"
        );
    }

    #[test]
    fn falling_margins_are_declining() {
        let enriched = derive(&series("A", &[40.0, 37.0, 35.0, 31.0]), &order()).unwrap();
        let a = &summarize(&enriched)["A"];

        assert!((a.avg_margin_delta_pct + 3.0).abs() < 1e-9);
        assert_eq!(a.trend_class, TrendClass::Declining);
        assert_eq!(a.latest_margin_pct, 31.0);
    }

    #[test]
    fn single_period_segment_is_stable_at_zero() {
        let enriched = derive(&series("Solo", &[55.0]), &order()).unwrap();
        let solo = &summarize(&enriched)["Solo"];

        assert_eq!(solo.avg_margin_delta_pct, 0.0);
        assert_eq!(solo.trend_class, TrendClass::Stable);
        assert_eq!(solo.latest_margin_pct, 55.0);
    }

    #[test]
    fn latest_margin_is_segment_local() {
        let mut rows = series("Long", &[10.0, 11.0, 12.0, 13.0]);
        rows.extend(series("Short", &[70.0, 71.0]));
        let insights = summarize(&derive(&rows, &order()).unwrap());

        assert_eq!(insights.len(), 2);
        assert_eq!(insights["Long"].latest_margin_pct, 13.0);
        assert_eq!(insights["Short"].latest_margin_pct, 71.0);
    }

    #[test]
    fn no_rows_no_insights() {
        assert!(summarize(&[]).is_empty());
    }
}

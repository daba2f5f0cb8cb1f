use std::collections::{BTreeMap, HashMap};

use crate::config::MARGIN_DROP_THRESHOLD_PCT;
use crate::error::EngineError;
use crate::types::{EnrichedRecord, FinancialRecord};

/// Enrich raw records with per-segment margin deltas and drop flags.
///
/// Records are grouped by segment and ordered by the position of their period
/// in `period_order`. Segments come out in name order, so the result does not
/// depend on the order of the input rows.
pub fn derive(
    records: &[FinancialRecord],
    period_order: &[String],
) -> Result<Vec<EnrichedRecord>, EngineError> {
    let rank: HashMap<&str, usize> = period_order
        .iter()
        .enumerate()
        .map(|(i, p)| (p.as_str(), i))
        .collect();

    let mut by_segment: BTreeMap<&str, Vec<(usize, &FinancialRecord)>> = BTreeMap::new();
    for record in records {
        let idx = *rank
            .get(record.period.as_str())
            .ok_or_else(|| EngineError::UnknownPeriod {
                segment: record.segment.clone(),
                period: record.period.clone(),
            })?;
        by_segment
            .entry(record.segment.as_str())
            .or_default()
            .push((idx, record));
    }

    let mut enriched = Vec::with_capacity(records.len());
    for (segment, mut rows) in by_segment {
        rows.sort_by_key(|(idx, _)| *idx);

        if let Some(pair) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(EngineError::DuplicatePeriod {
                segment: segment.to_string(),
                period: pair[1].1.period.clone(),
            });
        }

        let mut prev_margin: Option<f64> = None;
        for (_, record) in rows {
            let margin_delta_pct = prev_margin.map(|prev| record.gross_margin_pct - prev);
            enriched.push(EnrichedRecord {
                record: record.clone(),
                margin_delta_pct,
                drop_flag: is_margin_drop(margin_delta_pct),
            });
            prev_margin = Some(record.gross_margin_pct);
        }
    }

    Ok(enriched)
}

/// True only for a defined delta strictly below the drop threshold.
pub fn is_margin_drop(margin_delta_pct: Option<f64>) -> bool {
    margin_delta_pct.is_some_and(|d| d < MARGIN_DROP_THRESHOLD_PCT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Vec<String> {
        ["Q1 FY23", "Q2 FY23", "Q3 FY23", "Q4 FY23"]
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    fn rec(segment: &str, period: &str, margin: f64) -> FinancialRecord {
        FinancialRecord {
            segment: segment.to_string(),
            period: period.to_string(),
            revenue: 1.0,
            gross_margin_pct: margin,
        }
    }

    #[test]
    fn first_period_has_no_delta() {
        let out = derive(
            &[rec("A", "Q1 FY23", 20.0), rec("A", "Q2 FY23", 25.0), rec("A", "Q3 FY23", 21.0)],
            &order(),
        )
        .unwrap();

        let deltas: Vec<Option<f64>> = out.iter().map(|r| r.margin_delta_pct).collect();
        assert_eq!(deltas, vec![None, Some(5.0), Some(-4.0)]);
        assert_eq!(out.iter().filter(|r| r.drop_flag).count(), 1);
        assert!(out[2].drop_flag);
    }

    #[test]
    fn periods_follow_declared_order_not_alphabetic() {
        // Alphabetically "Q4 FY22" sorts after "Q1 FY23".
        let order: Vec<String> = ["Q4 FY22", "Q1 FY23"].iter().map(|p| p.to_string()).collect();
        let out = derive(&[rec("A", "Q1 FY23", 30.0), rec("A", "Q4 FY22", 40.0)], &order).unwrap();

        assert_eq!(out[0].period(), "Q4 FY22");
        assert_eq!(out[1].period(), "Q1 FY23");
        assert_eq!(out[1].margin_delta_pct, Some(-10.0));
    }

    #[test]
    fn drop_threshold_is_strict() {
        assert!(!is_margin_drop(Some(-2.5)));
        assert!(is_margin_drop(Some(-2.5001)));
        assert!(!is_margin_drop(Some(3.0)));
        assert!(!is_margin_drop(None));
    }

    #[test]
    fn deltas_never_cross_segments() {
        let out = derive(
            &[rec("B", "Q1 FY23", 10.0), rec("A", "Q2 FY23", 50.0), rec("A", "Q1 FY23", 60.0), rec("B", "Q2 FY23", 11.0)],
            &order(),
        )
        .unwrap();

        assert_eq!(out.len(), 4);
        assert_eq!(out[0].segment(), "A");
        assert_eq!(out[0].margin_delta_pct, None);
        assert_eq!(out[1].margin_delta_pct, Some(-10.0));
        assert!(out[1].drop_flag);
        assert_eq!(out[2].segment(), "B");
        assert_eq!(out[2].margin_delta_pct, None);
        assert_eq!(out[3].margin_delta_pct, Some(1.0));
    }

    #[test]
    fn input_row_order_does_not_change_output() {
        let rows = vec![
            rec("A", "Q1 FY23", 20.0),
            rec("A", "Q2 FY23", 25.0),
            rec("B", "Q1 FY23", 70.0),
            rec("A", "Q3 FY23", 21.0),
            rec("B", "Q3 FY23", 64.0),
            rec("B", "Q2 FY23", 68.0),
        ];
        let mut shuffled = rows.clone();
        shuffled.reverse();
        shuffled.swap(1, 4);

        assert_eq!(derive(&rows, &order()).unwrap(), derive(&shuffled, &order()).unwrap());
    }

    #[test]
    fn unknown_period_is_reported() {
        let err = derive(&[rec("A", "Q1 FY23", 20.0), rec("A", "H1 FY23", 21.0)], &order()).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownPeriod {
                segment: "A".to_string(),
                period: "H1 FY23".to_string()
            }
        );
    }

    #[test]
    fn duplicate_period_is_reported() {
        let err = derive(&[rec("A", "Q2 FY23", 20.0), rec("A", "Q2 FY23", 21.0)], &order()).unwrap_err();
        assert!(matches!(err, EngineError::DuplicatePeriod { .. }));
    }

    #[test]
    fn source_rows_are_left_untouched() {
        let rows = vec![rec("A", "Q2 FY23", 20.0), rec("A", "Q1 FY23", 25.0)];
        let before = rows.clone();
        let _ = derive(&rows, &order()).unwrap();
        assert_eq!(rows, before);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(derive(&[], &order()).unwrap().is_empty());
    }
}

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, Result};
use crate::types::FinancialRecord;

/// Row shape of the source table. Column names follow the published dataset;
/// snake_case headers are accepted as well.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Segment", alias = "segment")]
    segment: String,
    #[serde(rename = "Quarter", alias = "period", alias = "quarter")]
    period: String,
    #[serde(rename = "Revenue ($B)", alias = "revenue")]
    revenue: f64,
    #[serde(rename = "Gross Margin (%)", alias = "gross_margin_pct")]
    gross_margin_pct: f64,
}

/// Read every record from the delimited file at `path`.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<FinancialRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let records = parse_records(file)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse and validate records from any CSV source.
pub fn parse_records<R: Read>(source: R) -> Result<Vec<FinancialRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    // `line` counts data rows from 1; the header is not a data line.
    for (i, result) in reader.records().enumerate() {
        let line = i + 1;
        let row = result?;
        let raw: RawRow = row.deserialize(Some(&headers))?;
        records.push(validate(raw, line)?);
    }

    if records.is_empty() {
        return Err(AppError::EmptyDataset);
    }
    Ok(records)
}

fn validate(raw: RawRow, line: usize) -> Result<FinancialRecord> {
    let invalid = |reason: &str| AppError::InvalidRecord {
        line,
        reason: reason.to_string(),
    };

    if raw.segment.is_empty() {
        return Err(invalid("segment is empty"));
    }
    if raw.period.is_empty() {
        return Err(invalid("period is empty"));
    }
    if !raw.revenue.is_finite() || raw.revenue < 0.0 {
        return Err(invalid("revenue must be a finite, non-negative number"));
    }
    if !raw.gross_margin_pct.is_finite() {
        return Err(invalid("gross margin must be a finite number"));
    }

    Ok(FinancialRecord {
        segment: raw.segment,
        period: raw.period,
        revenue: raw.revenue,
        gross_margin_pct: raw.gross_margin_pct,
    })
}

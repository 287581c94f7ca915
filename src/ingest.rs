//! CSV ingest
//!
//! Reads a comma-separated export with a header row into [`Record`]s.
//! Record ids are assigned `1..=N` in file order. Cell values get a light
//! scrub so they survive the `;`-delimited bulk-loader batches downstream.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::canon::record::Record;
use crate::dimension::tables::RecordId;

/// Cell contents treated as "no value"
const NULL_TOKENS: &[&str] = &["", "nan", "NaN", "null", "None", "undefined"];

/// Scrub one cell; `None` for null tokens.
pub fn scrub(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '\r' | '\\'))
        .map(|c| match c {
            '\n' => ' ',
            ';' => ',',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim();

    if NULL_TOKENS.contains(&cleaned) {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Parse records from any reader
pub fn read_records_from<R: Read>(input: R) -> Result<Vec<Record>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(input);

    let headers = rdr.headers().context("Failed to read CSV header")?.clone();

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let row_no = row + 1;
        let row = result.with_context(|| format!("Failed to read CSV row {row_no}"))?;
        let id = RecordId::try_from(row_no).context("Record id out of range")?;

        if row.len() > headers.len() {
            warn!(
                row = row_no,
                cells = row.len(),
                columns = headers.len(),
                "row has more cells than the header, extra cells dropped"
            );
        }

        let fields: BTreeMap<String, Option<String>> = headers
            .iter()
            .zip(row.iter())
            .map(|(column, value)| (column.to_string(), scrub(value)))
            .collect();

        records.push(Record { id, fields });
    }

    Ok(records)
}

/// Read all records from a CSV file
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let records =
        read_records_from(file).with_context(|| format!("Failed to parse {}", path.display()))?;

    info!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

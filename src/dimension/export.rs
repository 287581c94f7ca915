//! Bulk-loader batches
//!
//! Tables are written the way the loader's `COPY ... FROM` expects them:
//! `;` delimited, no header row, one file per table named after it.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use super::tables::{BridgeTable, DimensionTable};
use crate::config::TableNames;

const DELIMITER: u8 = b';';

fn writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(out)
}

/// `id;name` rows
pub fn write_dimension<W: Write>(out: W, dimension: &DimensionTable) -> csv::Result<()> {
    let mut wtr = writer(out);
    for row in dimension.rows() {
        wtr.write_record([row.id.to_string(), row.name.clone()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// `record_id;term_id` rows
pub fn write_bridge<W: Write>(out: W, bridge: &BridgeTable) -> csv::Result<()> {
    let mut wtr = writer(out);
    for row in bridge.rows() {
        wtr.write_record([row.record_id.to_string(), row.term_id.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `<dimension>.csv` and `<bridge>.csv` into `dir`.
///
/// Nothing is written for an empty dimension. Returns the files written.
pub fn write_domain_tables(
    dir: &Path,
    names: &TableNames,
    dimension: &DimensionTable,
    bridge: &BridgeTable,
) -> Result<Vec<PathBuf>> {
    if dimension.is_empty() {
        info!(table = %names.dimension, "no terms observed, skipping export");
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let dimension_path = dir.join(format!("{}.csv", names.dimension));
    let file = std::fs::File::create(&dimension_path)
        .with_context(|| format!("Failed to create {}", dimension_path.display()))?;
    write_dimension(file, dimension)
        .with_context(|| format!("Failed to write {}", dimension_path.display()))?;

    let bridge_path = dir.join(format!("{}.csv", names.bridge));
    let file = std::fs::File::create(&bridge_path)
        .with_context(|| format!("Failed to create {}", bridge_path.display()))?;
    write_bridge(file, bridge)
        .with_context(|| format!("Failed to write {}", bridge_path.display()))?;

    info!(
        "Exported {} rows to '{}' and {} rows to '{}'",
        dimension.len(),
        names.dimension,
        bridge.len(),
        names.bridge
    );

    Ok(vec![dimension_path, bridge_path])
}

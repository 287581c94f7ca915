//! DimensionBuilder - turn per-record term sets into dimension + bridge tables.
//!
//! ## Build Process
//!
//! 1. Collect: union of every record's terms (closure-checked)
//! 2. Assign: sort the union, number it `1..=N`
//! 3. Emit: one bridge row per (record, term), in parallel
//!
//! Ids depend only on the set of observed terms, never on record order,
//! so the same input always yields the same tables. Step 2 needs the full
//! union and is the synchronization point of a run.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use super::tables::{BridgeRow, BridgeTable, DimensionTable, RecordId};
use crate::canon::record::ResolvedTermSet;
use crate::config::DomainConfig;
use crate::error::DimensionError;

/// Terms of one record after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRecord<'a> {
    pub record_id: RecordId,
    pub terms: ResolvedTermSet<'a>,
}

/// Builds the output tables of one domain
pub struct DimensionBuilder<'a> {
    domain: &'a DomainConfig,
}

impl<'a> DimensionBuilder<'a> {
    pub fn new(domain: &'a DomainConfig) -> Self {
        Self { domain }
    }

    /// Union of all terms; fails on a term outside the domain vocabulary.
    pub fn collect<'t>(
        &self,
        records: &[ResolvedRecord<'t>],
    ) -> Result<BTreeSet<&'t str>, DimensionError> {
        let terms: BTreeSet<&'t str> = records.iter().flat_map(|r| r.terms.iter()).collect();

        if let Some(term) = terms
            .iter()
            .find(|t| !self.domain.vocabulary.contains(t))
        {
            return Err(DimensionError::OutsideVocabulary {
                domain: self.domain.name.clone(),
                term: term.to_string(),
            });
        }

        Ok(terms)
    }

    /// Number the sorted union `1..=N`
    pub fn assign(&self, terms: BTreeSet<&str>) -> DimensionTable {
        DimensionTable::from_sorted(self.domain.name.as_str(), terms)
    }

    /// One bridge row per (record, term) pair
    pub fn emit_bridge(
        &self,
        dimension: &DimensionTable,
        records: &[ResolvedRecord<'_>],
    ) -> Result<BridgeTable, DimensionError> {
        let rows: Vec<Vec<BridgeRow>> = records
            .par_iter()
            .map(|record| {
                record
                    .terms
                    .iter()
                    .map(|term| {
                        dimension
                            .id_of(term)
                            .map(|term_id| BridgeRow {
                                record_id: record.record_id,
                                term_id,
                            })
                            .ok_or_else(|| DimensionError::DanglingTerm {
                                record_id: record.record_id,
                                term: term.to_string(),
                            })
                    })
                    .collect::<Result<Vec<_>, DimensionError>>()
            })
            .collect::<Result<Vec<_>, DimensionError>>()?;

        BridgeTable::from_rows(rows.into_iter().flatten().collect(), dimension)
    }

    /// Collect, assign and emit in one call
    pub fn build(
        &self,
        records: &[ResolvedRecord<'_>],
    ) -> Result<(DimensionTable, BridgeTable), DimensionError> {
        let terms = self.collect(records)?;
        let dimension = self.assign(terms);
        let bridge = self.emit_bridge(&dimension, records)?;

        debug!(
            domain = %self.domain.name,
            records = records.len(),
            terms = dimension.len(),
            bridge_rows = bridge.len(),
            "built dimension tables"
        );

        Ok((dimension, bridge))
    }
}

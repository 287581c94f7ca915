//! Canonicalization run over a batch of records
//!
//! Per-record resolution is independent and runs on the rayon pool, one
//! batch of records at a time. Dimension assignment waits for every batch,
//! then bridge rows are emitted. A cancelled run stops scheduling batches
//! and returns no tables at all: ids are only correct over the full term set.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::canon::record::{Record, RecordResolver};
use crate::canon::resolver::StageTally;
use crate::config::{CanonConfig, DomainConfig, TableNames};
use crate::dimension::{BridgeTable, DimensionBuilder, DimensionTable, ResolvedRecord};
use crate::error::PipelineError;

/// Default number of records scheduled per batch
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Shared cancellation signal, checked before each batch
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub records: usize,
    pub records_with_terms: usize,
    pub fragments: StageTally,
}

impl RunStats {
    fn merge(self, other: RunStats) -> RunStats {
        RunStats {
            records: self.records + other.records,
            records_with_terms: self.records_with_terms + other.records_with_terms,
            fragments: self.fragments.merge(other.fragments),
        }
    }
}

/// Everything a bulk loader needs for one domain
#[derive(Debug, Clone, Serialize)]
pub struct DomainTables {
    pub domain: String,
    pub tables: TableNames,
    pub dimension: DimensionTable,
    pub bridge: BridgeTable,
    pub stats: RunStats,
}

pub struct Pipeline<'a> {
    config: &'a CanonConfig,
    batch_size: usize,
    cancel: CancelFlag,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a CanonConfig) -> Self {
        Self {
            config,
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: CancelFlag::default(),
        }
    }

    /// Records per batch; values below 1 are treated as 1
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve all records for every configured domain
    pub fn run(&self, records: &[Record]) -> Result<Vec<DomainTables>, PipelineError> {
        let tables = self
            .config
            .domains()
            .iter()
            .map(|domain| self.run_domain(domain, records))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            records = records.len(),
            domains = tables.len(),
            "canonicalization run complete"
        );

        Ok(tables)
    }

    /// Resolve all records for the named domain
    pub fn run_named(&self, name: &str, records: &[Record]) -> Result<DomainTables, PipelineError> {
        let domain = self.config.domain(name)?;
        self.run_domain(domain, records)
    }

    fn run_domain(
        &self,
        domain: &DomainConfig,
        records: &[Record],
    ) -> Result<DomainTables, PipelineError> {
        let resolver = RecordResolver::new(domain);

        if !records.is_empty() && records.iter().all(|r| resolver.primary_column(r).is_none()) {
            warn!(
                domain = %domain.name,
                columns = ?domain.columns.primary,
                "no record has a primary column for this domain"
            );
        }

        let (resolved, stats) = self.resolve_batches(resolver, records)?;

        let (dimension, bridge) = DimensionBuilder::new(domain).build(&resolved)?;

        info!(
            domain = %domain.name,
            records = stats.records,
            with_terms = stats.records_with_terms,
            fragments = stats.fragments.total(),
            resolved_fragments = stats.fragments.resolved(),
            terms = dimension.len(),
            bridge_rows = bridge.len(),
            "domain canonicalized"
        );

        Ok(DomainTables {
            domain: domain.name.clone(),
            tables: domain.tables.clone(),
            dimension,
            bridge,
            stats,
        })
    }

    fn resolve_batches<'d>(
        &self,
        resolver: RecordResolver<'d>,
        records: &[Record],
    ) -> Result<(Vec<ResolvedRecord<'d>>, RunStats), PipelineError> {
        let mut resolved = Vec::with_capacity(records.len());
        let mut stats = RunStats::default();

        for (batch_no, batch) in records.chunks(self.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    domain = %resolver.domain().name,
                    completed_batches = batch_no,
                    "run cancelled, discarding partial output"
                );
                return Err(PipelineError::Cancelled {
                    completed_batches: batch_no,
                });
            }

            let results: Vec<(ResolvedRecord<'d>, StageTally)> = batch
                .par_iter()
                .map(|record| {
                    let mut tally = StageTally::default();
                    let terms = resolver.resolve_record_tallied(record, &mut tally);
                    (
                        ResolvedRecord {
                            record_id: record.id,
                            terms,
                        },
                        tally,
                    )
                })
                .collect();

            let batch_stats = results
                .iter()
                .fold(RunStats::default(), |acc, (record, tally)| {
                    acc.merge(RunStats {
                        records: 1,
                        records_with_terms: usize::from(!record.terms.is_empty()),
                        fragments: tally.clone(),
                    })
                });

            debug!(
                domain = %resolver.domain().name,
                batch = batch_no,
                records = batch_stats.records,
                with_terms = batch_stats.records_with_terms,
                "batch resolved"
            );

            stats = stats.merge(batch_stats);
            resolved.extend(results.into_iter().map(|(record, _)| record));
        }

        Ok((resolved, stats))
    }
}

//! Clinical term canonicalization
//!
//! Maps free-text clinical fields (symptoms, comorbidities) onto closed,
//! per-domain vocabularies of canonical terms, then materializes the
//! result as a dimension table plus a record/term bridge table ready for
//! bulk loading.
//!
//! ```text
//! CSV ──► ingest ──► Record ──► RecordResolver ──► DimensionBuilder ──► export
//!                                  │
//!                                  └── split ─► TermResolver (per fragment)
//! ```
//!
//! Vocabularies, override rules and blocklists come from YAML
//! ([`config::ConfigLoader`]) or the bundled default ([`CanonConfig::builtin`]).

pub mod canon;
pub mod config;
pub mod dimension;
pub mod error;
pub mod ingest;
pub mod pipeline;

pub use canon::{
    normalize, split, Record, RecordResolver, Resolution, ResolvedTermSet, Stage, StageTally,
    TermResolver,
};
pub use config::{CanonConfig, ConfigLoader, DomainConfig, Vocabulary};
pub use dimension::{BridgeTable, DimensionBuilder, DimensionTable};
pub use error::{ConfigError, DimensionError, PipelineError};
pub use pipeline::{CancelFlag, DomainTables, Pipeline, RunStats};

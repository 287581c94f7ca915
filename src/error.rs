//! Error types for canonicalization
//!
//! Resolution itself never fails: an unresolvable fragment is a normal
//! "no term" outcome. Errors only surface for configuration defects
//! (detected once, at load time), broken table invariants, and aborted runs.

use thiserror::Error;

use crate::dimension::tables::{RecordId, TermId};

/// Configuration defects detected while loading domain configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("override '{key}' maps to '{target}', which is not in any vocabulary{}", suggestion_suffix(.suggestion))]
    UnknownOverrideTarget {
        key: String,
        target: String,
        suggestion: Option<String>,
    },

    #[error("override '{key}' must set exactly one of `map_to` or `suppress: true`")]
    AmbiguousOverride { key: String },

    #[error("override key '{raw}' is empty after normalization")]
    EmptyOverrideKey { raw: String },

    #[error("blocklist entry '{raw}' is empty after normalization")]
    EmptyBlocklistEntry { raw: String },

    #[error("domain '{domain}' has an empty vocabulary")]
    EmptyVocabulary { domain: String },

    #[error("domain '{domain}' lists '{term}' more than once (as '{folded}')")]
    DuplicateTerm {
        domain: String,
        term: String,
        folded: String,
    },

    #[error("domain '{0}' is configured more than once")]
    DuplicateDomain(String),

    #[error("domain '{0}' has no primary column")]
    MissingPrimaryColumn(String),

    #[error("no domain named '{0}'")]
    UnknownDomain(String),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

/// Violations of the dimension/bridge invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DimensionError {
    #[error("term '{term}' is not a member of the '{domain}' vocabulary")]
    OutsideVocabulary { domain: String, term: String },

    #[error("record {record_id} references term '{term}' missing from the dimension")]
    DanglingTerm { record_id: RecordId, term: String },

    #[error("bridge row ({record_id}, {term_id}) references no dimension row")]
    DanglingTermId { record_id: RecordId, term_id: TermId },
}

/// Failures of a whole canonicalization run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("run cancelled after {completed_batches} batch(es); partial output discarded")]
    Cancelled { completed_batches: usize },

    #[error("Dimension error: {0}")]
    Dimension(#[from] DimensionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

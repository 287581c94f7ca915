//! Static domain configuration: vocabularies, override rules, blocklists.
//!
//! Loaded once per run and never mutated afterwards.

pub mod loader;
pub mod types;

pub use loader::{parse_config, ConfigLoader};
pub use types::{
    Blocklist, CanonConfig, ColumnSpec, DomainConfig, OverrideAction, OverrideRule, TableNames,
    VocabEntry, Vocabulary,
};

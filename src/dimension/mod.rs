//! Dimensional normalization: dimension tables, bridge tables, loader batches

pub mod builder;
pub mod export;
pub mod tables;

pub use builder::{DimensionBuilder, ResolvedRecord};
pub use export::write_domain_tables;
pub use tables::{BridgeRow, BridgeTable, DimensionRow, DimensionTable, RecordId, TermId};

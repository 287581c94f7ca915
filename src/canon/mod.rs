//! Term canonicalization
//!
//! Noisy free text is reduced to a closed vocabulary in four steps:
//! normalize -> split -> resolve -> per-record union.
//!
//! ```text
//! "01 - Febre; tosse e cansaço"
//!       │ split
//!       ▼
//! ["Febre", "tosse", "cansaço"]
//!       │ resolve (blocklist → overrides → fuzzy → stem)
//!       ▼
//! {Febre, Tosse, Fadiga}
//! ```

pub mod normalize;
pub mod record;
pub mod resolver;
pub mod similarity;
pub mod split;

pub use normalize::normalize;
pub use record::{resolve_fields, Record, RecordResolver, ResolvedTermSet};
pub use resolver::{Resolution, Stage, StageTally, TermResolver, FUZZY_CUTOFF};
pub use split::split;

//! Relational output batches
//!
//! A [`DimensionTable`] lists the distinct canonical terms observed in one
//! domain with surrogate ids `1..=N`; a [`BridgeTable`] links records to
//! those ids. Both are built once per run and never mutated afterwards.

use serde::Serialize;
use std::collections::HashMap;

use crate::error::DimensionError;

/// Source record identifier
pub type RecordId = i64;

/// Surrogate key of a dimension row
pub type TermId = i64;

/// A single dimension row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionRow {
    pub id: TermId,
    pub name: String,
}

/// Distinct canonical terms of one domain with their surrogate ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionTable {
    pub domain: String,
    rows: Vec<DimensionRow>,
    #[serde(skip)]
    index: HashMap<String, TermId>,
}

impl DimensionTable {
    /// Assign ids `1..=N` to `names` in the order given.
    ///
    /// Callers pass names already sorted and deduplicated.
    pub(crate) fn from_sorted<I, S>(domain: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows: Vec<DimensionRow> = names
            .into_iter()
            .zip(1..)
            .map(|(name, id)| DimensionRow {
                id,
                name: name.into(),
            })
            .collect();

        let index = rows.iter().map(|r| (r.name.clone(), r.id)).collect();

        Self {
            domain: domain.into(),
            rows,
            index,
        }
    }

    pub fn id_of(&self, name: &str) -> Option<TermId> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, id: TermId) -> Option<&str> {
        id.checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.rows.get(i))
            .map(|r| r.name.as_str())
    }

    pub fn rows(&self) -> &[DimensionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single record -> term association
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BridgeRow {
    pub record_id: RecordId,
    pub term_id: TermId,
}

/// Record/term associations, sorted by `(record_id, term_id)`, no duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BridgeTable {
    rows: Vec<BridgeRow>,
}

impl BridgeTable {
    /// Sort and deduplicate `rows`, rejecting ids with no dimension row.
    pub fn from_rows(
        mut rows: Vec<BridgeRow>,
        dimension: &DimensionTable,
    ) -> Result<Self, DimensionError> {
        if let Some(row) = rows
            .iter()
            .find(|r| dimension.name_of(r.term_id).is_none())
        {
            return Err(DimensionError::DanglingTermId {
                record_id: row.record_id,
                term_id: row.term_id,
            });
        }

        rows.sort_unstable();
        rows.dedup();
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[BridgeRow] {
        &self.rows
    }

    pub fn contains(&self, record_id: RecordId, term_id: TermId) -> bool {
        self.rows
            .binary_search(&BridgeRow { record_id, term_id })
            .is_ok()
    }

    /// Term ids linked to one record, ascending
    pub fn terms_for(&self, record_id: RecordId) -> impl Iterator<Item = TermId> + '_ {
        let start = self.rows.partition_point(|r| r.record_id < record_id);
        self.rows[start..]
            .iter()
            .take_while(move |r| r.record_id == record_id)
            .map(|r| r.term_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

//! Record-level resolution
//!
//! A record carries one domain's text in up to two columns: a primary
//! multi-valued column and a free-text "other" column. Both are split,
//! every fragment is resolved, and the results are collapsed into a set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

use super::resolver::{StageTally, TermResolver};
use super::split::split_raw;
use crate::config::DomainConfig;
use crate::dimension::tables::RecordId;

/// A raw record: column name -> optional, loosely cleaned string value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: BTreeMap<String, Option<String>>,
}

impl Record {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, column: &str, value: Option<&str>) -> Self {
        self.fields
            .insert(column.to_string(), value.map(str::to_string));
        self
    }

    /// Whether the record has the column at all (even if absent-valued)
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|v| v.as_deref())
    }
}

/// Canonical terms of one record in one domain; empty means "no term"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedTermSet<'a> {
    terms: BTreeSet<&'a str>,
}

impl<'a> ResolvedTermSet<'a> {
    pub fn insert(&mut self, term: &'a str) -> bool {
        self.terms.insert(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.terms.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for ResolvedTermSet<'a> {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

/// Resolve every fragment of the given raw fields and union the results.
///
/// Decisions are counted into `tally`, one per raw piece.
pub fn resolve_fields<'a, 'r>(
    fields: impl IntoIterator<Item = &'r str>,
    resolver: &TermResolver<'a>,
    tally: &mut StageTally,
) -> ResolvedTermSet<'a> {
    let mut terms = ResolvedTermSet::default();

    for raw in fields {
        for piece in split_raw(raw) {
            let resolution = resolver.explain(piece);
            tally.record(resolution.stage());
            if let Some(term) = resolution.term() {
                terms.insert(term);
            }
        }
    }

    terms
}

/// Resolves whole records for one domain
#[derive(Debug, Clone, Copy)]
pub struct RecordResolver<'a> {
    domain: &'a DomainConfig,
    terms: TermResolver<'a>,
}

impl<'a> RecordResolver<'a> {
    pub fn new(domain: &'a DomainConfig) -> Self {
        Self {
            domain,
            terms: TermResolver::for_domain(domain),
        }
    }

    pub fn domain(&self) -> &'a DomainConfig {
        self.domain
    }

    /// First configured primary column the record actually has
    pub fn primary_column(&self, record: &Record) -> Option<&'a str> {
        self.domain
            .columns
            .primary
            .iter()
            .find(|c| record.has_column(c))
            .map(String::as_str)
    }

    /// Present values of the primary and secondary columns, in that order
    pub fn raw_fields<'r>(&self, record: &'r Record) -> Vec<&'r str> {
        let primary = self.primary_column(record);
        let secondary = self.domain.columns.secondary.as_deref();

        [primary, secondary]
            .into_iter()
            .flatten()
            .filter_map(|column| record.field(column))
            .collect()
    }

    pub fn resolve_record(&self, record: &Record) -> ResolvedTermSet<'a> {
        let mut tally = StageTally::default();
        self.resolve_record_tallied(record, &mut tally)
    }

    pub fn resolve_record_tallied(
        &self,
        record: &Record,
        tally: &mut StageTally,
    ) -> ResolvedTermSet<'a> {
        resolve_fields(self.raw_fields(record), &self.terms, tally)
    }
}

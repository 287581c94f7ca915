//! Fragment splitting for multi-valued free-text fields
//!
//! A raw field such as `"01 - Febre; Tosse e coriza"` holds several
//! candidate terms. Splitting happens on the delimiter class `[;,/|+]`,
//! on the conjunction " e " and on a spaced hyphen " - ".

use regex::Regex;
use std::sync::LazyLock;

use super::normalize::clean_fragment;

static SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,/|+]|\s+[eE]\s+|\s+-\s+").expect("split pattern"));

/// Raw pieces of a field, before cleanup. Empty pieces are kept.
pub fn split_raw(raw: &str) -> impl Iterator<Item = &str> + '_ {
    SPLIT_RE.split(raw)
}

/// Cleaned candidate fragments of a field.
///
/// Each piece is cleaned independently; pieces that end up shorter than
/// three characters are dropped. The iterator borrows `raw` only, so it can
/// be recreated at will.
pub fn split(raw: &str) -> impl Iterator<Item = String> + '_ {
    split_raw(raw).filter_map(clean_fragment)
}

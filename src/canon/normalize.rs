//! Text normalization for term matching
//!
//! Every comparison in the resolver runs on folded text:
//! - Lowercase conversion
//! - Whitespace trimming
//! - Unicode NFD decomposition with combining marks removed (accent folding)
//!
//! Original casing and accents are never compared directly.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fragments shorter than this (in characters, after cleanup) are noise
pub const MIN_FRAGMENT_CHARS: usize = 3;

/// Leading run of digits, punctuation, whitespace and underscores ("01 - ")
static LEADING_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\W_]+").expect("leading noise pattern"));

/// Stray characters dropped anywhere in a fragment
const STRAY_CHARS: &[char] = &[';', '"', '\''];

/// Fold text to its comparison form.
///
/// # Examples
///
/// ```
/// use clinical_canon::canon::normalize::normalize;
///
/// assert_eq!(normalize("  Náusea "), "nausea");
/// assert_eq!(normalize("DOR DE CABEÇA"), "dor de cabeca");
/// ```
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Absent values fold to the empty string.
pub fn normalize_opt(s: Option<&str>) -> String {
    s.map(normalize).unwrap_or_default()
}

/// Strip list numbering and stray quoting from a raw fragment.
///
/// Returns `None` when fewer than [`MIN_FRAGMENT_CHARS`] characters remain
/// (codes, single letters, "Ok").
pub fn clean_fragment(raw: &str) -> Option<String> {
    let stripped = LEADING_NOISE_RE.replace(raw, "");
    let cleaned: String = stripped
        .trim()
        .chars()
        .filter(|c| !STRAY_CHARS.contains(c))
        .collect();

    if cleaned.chars().count() < MIN_FRAGMENT_CHARS {
        None
    } else {
        Some(cleaned)
    }
}

/// Title-case the way the fuzzy matcher compares strings: a cased character
/// is uppercased when it follows an uncased one, lowercased otherwise.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;

    for c in s.chars() {
        let cased = c.is_lowercase() || c.is_uppercase();
        if cased && !prev_cased {
            out.extend(c.to_uppercase());
        } else if cased {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }

    out
}

/// Folded first word of a vocabulary term ("Dor De Cabeca" -> "dor")
pub fn stem(term: &str) -> String {
    term.split_whitespace()
        .next()
        .map(normalize)
        .unwrap_or_default()
}

//! Term resolution: one fragment, one vocabulary, at most one canonical term
//!
//! The decision chain runs in a fixed order and stops at the first stage
//! that decides:
//!
//! 1. cleanup; fewer than 3 characters left -> none
//! 2. blocklist substring present -> none
//! 3. override rules, first key contained in the fragment wins
//!    (`Suppress` -> none; `MapTo` -> the term, only if it is in the target
//!    vocabulary, otherwise the rule is skipped)
//! 4. fuzzy match, best ratio >= [`FUZZY_CUTOFF`]
//! 5. first-word stem fallback, with the pain compound table for "dor"
//!
//! Every returned term borrows from the target [`Vocabulary`], so output
//! outside the closed vocabulary cannot be produced.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

use super::normalize::{clean_fragment, normalize, title_case};
use super::similarity::ratio;
use crate::config::{Blocklist, DomainConfig, OverrideAction, OverrideRule, Vocabulary};

/// Minimum similarity ratio for a fuzzy match
pub const FUZZY_CUTOFF: f64 = 0.75;

/// Stems must be longer than this to be used by the substring fallback
const STEM_MIN_CHARS: usize = 3;

/// Stems too generic to identify a term on their own
const STOP_STEMS: &[&str] = &["doenca", "dor", "perda"];

/// The generic pain stem, disambiguated by [`PAIN_COMPOUNDS`]
const PAIN_STEM: &str = "dor";

/// Qualifier found next to "dor" -> pain term
const PAIN_COMPOUNDS: &[(&str, &str)] = &[
    ("cabeca", "Dor De Cabeca"),
    ("garganta", "Dor De Garganta"),
    ("corpo", "Dor No Corpo"),
];

/// Which stage of the chain decided a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TooShort,
    Blocked,
    Suppressed,
    Override,
    Fuzzy,
    Stem,
    PainCompound,
    Unmatched,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::TooShort,
        Stage::Blocked,
        Stage::Suppressed,
        Stage::Override,
        Stage::Fuzzy,
        Stage::Stem,
        Stage::PainCompound,
        Stage::Unmatched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::TooShort => "too_short",
            Stage::Blocked => "blocked",
            Stage::Suppressed => "suppressed",
            Stage::Override => "override",
            Stage::Fuzzy => "fuzzy",
            Stage::Stem => "stem",
            Stage::PainCompound => "pain_compound",
            Stage::Unmatched => "unmatched",
        }
    }
}

/// Decisions per stage, for run reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StageTally {
    counts: BTreeMap<Stage, usize>,
}

impl StageTally {
    pub fn record(&mut self, stage: Stage) {
        *self.counts.entry(stage).or_default() += 1;
    }

    pub fn get(&self, stage: Stage) -> usize {
        self.counts.get(&stage).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Fragments that produced a term
    pub fn resolved(&self) -> usize {
        [
            Stage::Override,
            Stage::Fuzzy,
            Stage::Stem,
            Stage::PainCompound,
        ]
        .iter()
        .map(|s| self.get(*s))
        .sum()
    }

    pub fn merge(mut self, other: StageTally) -> StageTally {
        for (stage, n) in other.counts {
            *self.counts.entry(stage).or_default() += n;
        }
        self
    }
}

/// Outcome of resolving one fragment, with the evidence for it
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    TooShort,
    Blocked { entry: &'a str },
    Suppressed { key: &'a str },
    Override { key: &'a str, term: &'a str },
    Fuzzy { term: &'a str, ratio: f64 },
    Stem { stem: &'a str, term: &'a str },
    PainCompound { qualifier: &'static str, term: &'a str },
    Unmatched,
}

impl<'a> Resolution<'a> {
    pub fn term(&self) -> Option<&'a str> {
        match self {
            Resolution::Override { term, .. }
            | Resolution::Fuzzy { term, .. }
            | Resolution::Stem { term, .. }
            | Resolution::PainCompound { term, .. } => Some(*term),
            Resolution::TooShort
            | Resolution::Blocked { .. }
            | Resolution::Suppressed { .. }
            | Resolution::Unmatched => None,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Resolution::TooShort => Stage::TooShort,
            Resolution::Blocked { .. } => Stage::Blocked,
            Resolution::Suppressed { .. } => Stage::Suppressed,
            Resolution::Override { .. } => Stage::Override,
            Resolution::Fuzzy { .. } => Stage::Fuzzy,
            Resolution::Stem { .. } => Stage::Stem,
            Resolution::PainCompound { .. } => Stage::PainCompound,
            Resolution::Unmatched => Stage::Unmatched,
        }
    }
}

/// Resolves fragments against one vocabulary and its rules.
///
/// Holds only shared references to read-only configuration, so a resolver
/// can be copied freely into parallel workers.
#[derive(Debug, Clone, Copy)]
pub struct TermResolver<'a> {
    vocabulary: &'a Vocabulary,
    overrides: &'a [OverrideRule],
    blocklist: &'a Blocklist,
}

impl<'a> TermResolver<'a> {
    pub fn new(
        vocabulary: &'a Vocabulary,
        overrides: &'a [OverrideRule],
        blocklist: &'a Blocklist,
    ) -> Self {
        Self {
            vocabulary,
            overrides,
            blocklist,
        }
    }

    pub fn for_domain(domain: &'a DomainConfig) -> Self {
        Self::new(&domain.vocabulary, &domain.overrides, &domain.blocklist)
    }

    /// Canonical term for `fragment`, or `None`
    pub fn resolve(&self, fragment: &str) -> Option<&'a str> {
        self.explain(fragment).term()
    }

    /// Run the decision chain and report which stage decided
    pub fn explain(&self, fragment: &str) -> Resolution<'a> {
        let resolution = self.decide(fragment);
        trace!(
            fragment,
            stage = resolution.stage().as_str(),
            term = resolution.term().unwrap_or(""),
            "resolved fragment"
        );
        resolution
    }

    fn decide(&self, fragment: &str) -> Resolution<'a> {
        let Some(cleaned) = clean_fragment(fragment) else {
            return Resolution::TooShort;
        };
        let folded = normalize(&cleaned);

        if let Some(entry) = self.blocklist.find(&folded) {
            return Resolution::Blocked { entry };
        }

        for rule in self.overrides {
            if !folded.contains(rule.key.as_str()) {
                continue;
            }
            match &rule.action {
                OverrideAction::Suppress => return Resolution::Suppressed { key: &rule.key },
                OverrideAction::MapTo(target) => {
                    // A target from another domain's vocabulary does not apply here
                    if let Some(term) = self.vocabulary.get(target) {
                        return Resolution::Override {
                            key: &rule.key,
                            term,
                        };
                    }
                }
            }
        }

        if let Some((term, ratio)) = self.best_fuzzy(&folded) {
            return Resolution::Fuzzy { term, ratio };
        }

        self.stem_fallback(&folded)
    }

    /// Highest-ratio vocabulary term at or above the cutoff. Candidates are
    /// ranked by `(ratio, term)`, so a tie goes to the greatest term.
    fn best_fuzzy(&self, folded: &str) -> Option<(&'a str, f64)> {
        let probe = title_case(folded);
        let mut best: Option<(&'a str, f64)> = None;

        for entry in self.vocabulary.entries() {
            let score = ratio(&entry.match_form, &probe);
            if score < FUZZY_CUTOFF {
                continue;
            }
            let term = entry.term.as_str();
            let better = match best {
                None => true,
                Some((best_term, best_score)) => {
                    score > best_score || (score == best_score && term > best_term)
                }
            };
            if better {
                best = Some((term, score));
            }
        }

        best
    }

    fn stem_fallback(&self, folded: &str) -> Resolution<'a> {
        for entry in self.vocabulary.entries() {
            let stem = entry.stem.as_str();

            if stem == PAIN_STEM {
                if folded.contains(PAIN_STEM) {
                    if let Some(resolution) = self.pain_compound(folded) {
                        return resolution;
                    }
                }
                continue;
            }

            if STOP_STEMS.contains(&stem) {
                continue;
            }

            if stem.chars().count() > STEM_MIN_CHARS && folded.contains(stem) {
                return Resolution::Stem {
                    stem,
                    term: &entry.term,
                };
            }
        }

        Resolution::Unmatched
    }

    fn pain_compound(&self, folded: &str) -> Option<Resolution<'a>> {
        PAIN_COMPOUNDS
            .iter()
            .filter(|(qualifier, _)| folded.contains(qualifier))
            .find_map(|&(qualifier, term)| {
                self.vocabulary
                    .get(term)
                    .map(|term| Resolution::PainCompound { qualifier, term })
            })
    }
}

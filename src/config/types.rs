//! Runtime configuration types
//!
//! These are the validated, immutable forms of `canon.yaml`. They are built
//! once before any resolution starts and shared read-only by all workers.

use serde::Serialize;
use std::collections::HashSet;

use crate::canon::normalize::{normalize, stem, title_case};
use crate::error::ConfigError;

/// One canonical term with its precomputed comparison forms
#[derive(Debug, Clone, Serialize)]
pub struct VocabEntry {
    /// Display string, exactly as it is persisted
    pub term: String,
    /// Folded form (lowercase, no accents)
    pub folded: String,
    /// Title-cased folded form used by the fuzzy matcher
    pub match_form: String,
    /// Folded first word used by the substring fallback
    pub stem: String,
}

impl VocabEntry {
    fn new(term: String) -> Self {
        let folded = normalize(&term);
        let match_form = title_case(&folded);
        let stem = stem(&term);
        Self {
            term,
            folded,
            match_form,
            stem,
        }
    }
}

/// Ordered, closed list of canonical terms for one domain
#[derive(Debug, Clone, Default, Serialize)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
}

impl Vocabulary {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: terms
                .into_iter()
                .map(|t| VocabEntry::new(t.into()))
                .collect(),
        }
    }

    /// Exact membership; returns the vocabulary's own copy of the term.
    pub fn get(&self, term: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.term == term)
            .map(|e| e.term.as_str())
    }

    pub fn contains(&self, term: &str) -> bool {
        self.get(term).is_some()
    }

    pub fn entries(&self) -> &[VocabEntry] {
        &self.entries
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.term.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What an override does when its key is found in a fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// Discard the fragment
    Suppress,
    /// Resolve to this term, if it belongs to the target vocabulary
    MapTo(String),
}

/// A `(substring, action)` pair; keys are stored folded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideRule {
    pub key: String,
    pub action: OverrideAction,
    /// Key as written in the configuration
    #[serde(skip)]
    raw_key: String,
}

impl OverrideRule {
    pub fn map_to(key: &str, term: impl Into<String>) -> Self {
        Self::new(key, OverrideAction::MapTo(term.into()))
    }

    pub fn suppress(key: &str) -> Self {
        Self::new(key, OverrideAction::Suppress)
    }

    fn new(key: &str, action: OverrideAction) -> Self {
        Self {
            key: normalize(key),
            action,
            raw_key: key.to_string(),
        }
    }

    pub fn raw_key(&self) -> &str {
        &self.raw_key
    }
}

/// Substrings that unconditionally suppress resolution
#[derive(Debug, Clone, Default, Serialize)]
pub struct Blocklist {
    entries: Vec<String>,
    /// Inputs that folded to nothing; never matched
    #[serde(skip)]
    blank: Vec<String>,
}

impl Blocklist {
    /// Entries are folded and deduplicated; declaration order is kept.
    /// Entries that fold to the empty string are set aside, see
    /// [`Blocklist::blank_entries`].
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut blocklist = Self::default();
        for raw in entries {
            let raw = raw.as_ref();
            let folded = normalize(raw);
            if folded.is_empty() {
                blocklist.blank.push(raw.to_string());
            } else if seen.insert(folded.clone()) {
                blocklist.entries.push(folded);
            }
        }
        blocklist
    }

    /// First entry occurring in the folded fragment
    pub fn find(&self, folded: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| folded.contains(e.as_str()))
            .map(String::as_str)
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Raw inputs rejected because they fold to nothing
    pub fn blank_entries(&self) -> &[String] {
        &self.blank
    }

    /// Union; entries of `self` come first.
    pub fn merged(&self, other: &Blocklist) -> Blocklist {
        let mut merged = Blocklist::new(self.entries.iter().chain(other.entries.iter()));
        merged.blank = self.blank.iter().chain(other.blank.iter()).cloned().collect();
        merged
    }
}

/// Source columns of one domain in a raw record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    /// Candidate names for the primary column, first present wins
    pub primary: Vec<String>,
    /// Free-text "other" column
    pub secondary: Option<String>,
}

/// Destination table names handed to the bulk loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableNames {
    pub dimension: String,
    pub id_column: String,
    pub bridge: String,
}

/// Complete configuration of one domain (symptoms, conditions, ...)
#[derive(Debug, Clone, Serialize)]
pub struct DomainConfig {
    pub name: String,
    pub vocabulary: Vocabulary,
    pub overrides: Vec<OverrideRule>,
    pub blocklist: Blocklist,
    pub columns: ColumnSpec,
    pub tables: TableNames,
}

impl DomainConfig {
    /// Domain with no rules, reading column `name` into table `name`.
    pub fn new(name: impl Into<String>, vocabulary: Vocabulary) -> Self {
        let name = name.into();
        Self {
            columns: ColumnSpec {
                primary: vec![name.clone()],
                secondary: None,
            },
            tables: TableNames {
                dimension: name.clone(),
                id_column: format!("{}_id", name),
                bridge: format!("record_{}", name),
            },
            name,
            vocabulary,
            overrides: Vec::new(),
            blocklist: Blocklist::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: Vec<OverrideRule>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_blocklist(mut self, blocklist: Blocklist) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn with_columns(mut self, primary: &[&str], secondary: Option<&str>) -> Self {
        self.columns = ColumnSpec {
            primary: primary.iter().map(|c| c.to_string()).collect(),
            secondary: secondary.map(str::to_string),
        };
        self
    }

    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.vocabulary.is_empty() {
            return Err(ConfigError::EmptyVocabulary {
                domain: self.name.clone(),
            });
        }

        let mut folded = HashSet::new();
        for entry in self.vocabulary.entries() {
            if !folded.insert(entry.folded.as_str()) {
                return Err(ConfigError::DuplicateTerm {
                    domain: self.name.clone(),
                    term: entry.term.clone(),
                    folded: entry.folded.clone(),
                });
            }
        }

        if self.columns.primary.is_empty() {
            return Err(ConfigError::MissingPrimaryColumn(self.name.clone()));
        }

        for rule in &self.overrides {
            if rule.key.is_empty() {
                return Err(ConfigError::EmptyOverrideKey {
                    raw: rule.raw_key().to_string(),
                });
            }
        }

        if let Some(raw) = self.blocklist.blank_entries().first() {
            return Err(ConfigError::EmptyBlocklistEntry { raw: raw.clone() });
        }

        Ok(())
    }
}

/// All configured domains, validated as a whole
#[derive(Debug, Clone, Serialize)]
pub struct CanonConfig {
    pub version: String,
    domains: Vec<DomainConfig>,
}

impl CanonConfig {
    /// Validate domains individually and against each other.
    ///
    /// An override may target a term of a *different* domain (it simply does
    /// not apply in its own domain), but its target must exist somewhere.
    pub fn new(version: impl Into<String>, domains: Vec<DomainConfig>) -> Result<Self, ConfigError> {
        let mut names = HashSet::new();
        for domain in &domains {
            if !names.insert(domain.name.as_str()) {
                return Err(ConfigError::DuplicateDomain(domain.name.clone()));
            }
            domain.validate()?;
        }

        for domain in &domains {
            for rule in &domain.overrides {
                if let OverrideAction::MapTo(target) = &rule.action {
                    if !domains.iter().any(|d| d.vocabulary.contains(target)) {
                        return Err(ConfigError::UnknownOverrideTarget {
                            key: rule.key.clone(),
                            target: target.clone(),
                            suggestion: suggest_term(target, &domains),
                        });
                    }
                }
            }
        }

        Ok(Self {
            version: version.into(),
            domains,
        })
    }

    pub fn domains(&self) -> &[DomainConfig] {
        &self.domains
    }

    pub fn domain(&self, name: &str) -> Result<&DomainConfig, ConfigError> {
        self.domains
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ConfigError::UnknownDomain(name.to_string()))
    }
}

/// Threshold below which no "did you mean" suggestion is offered
const SUGGESTION_MIN_SCORE: f64 = 0.8;

/// Closest vocabulary term across all domains (Jaro-Winkler on folded text)
fn suggest_term(target: &str, domains: &[DomainConfig]) -> Option<String> {
    let target = normalize(target);
    domains
        .iter()
        .flat_map(|d| d.vocabulary.entries())
        .map(|e| (strsim::jaro_winkler(&target, &e.folded), e))
        .filter(|(score, _)| *score >= SUGGESTION_MIN_SCORE)
        .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, e)| e.term.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symptoms() -> DomainConfig {
        DomainConfig::new("symptoms", Vocabulary::new(["Febre", "Tosse", "Fadiga"]))
    }

    fn conditions() -> DomainConfig {
        DomainConfig::new("conditions", Vocabulary::new(["Diabetes", "Hipertensao"]))
    }

    #[test]
    fn test_vocabulary_entries_precomputed() {
        let vocab = Vocabulary::new(["Dor De Cabeça"]);
        let entry = &vocab.entries()[0];
        assert_eq!(entry.folded, "dor de cabeca");
        assert_eq!(entry.match_form, "Dor De Cabeca");
        assert_eq!(entry.stem, "dor");
        assert_eq!(vocab.get("Dor De Cabeça"), Some("Dor De Cabeça"));
        assert!(!vocab.contains("dor de cabeça"));
    }

    #[test]
    fn test_override_keys_are_folded() {
        let rule = OverrideRule::map_to("Cansaço", "Fadiga");
        assert_eq!(rule.key, "cansaco");
        assert_eq!(OverrideRule::suppress(" ALERGIA ").key, "alergia");
    }

    #[test]
    fn test_blocklist_find_and_merge() {
        let a = Blocklist::new(["Exame", "covid"]);
        let b = Blocklist::new(["covid", "óbito"]);
        let merged = a.merged(&b);
        assert_eq!(merged.entries(), &["exame", "covid", "obito"]);
        assert_eq!(merged.find("exame covid positivo"), Some("exame"));
        assert_eq!(merged.find("febre"), None);
    }

    #[test]
    fn test_cross_domain_override_target_is_valid() {
        let symptoms =
            symptoms().with_overrides(vec![OverrideRule::map_to("pressao", "Hipertensao")]);
        assert!(CanonConfig::new("1", vec![symptoms, conditions()]).is_ok());
    }

    #[test]
    fn test_unknown_override_target_is_rejected_with_suggestion() {
        let symptoms = symptoms().with_overrides(vec![OverrideRule::map_to("febril", "Febr")]);
        let err = CanonConfig::new("1", vec![symptoms, conditions()]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownOverrideTarget {
                key: "febril".to_string(),
                target: "Febr".to_string(),
                suggestion: Some("Febre".to_string()),
            }
        );
        assert!(err.to_string().contains("did you mean 'Febre'"));
    }

    #[test]
    fn test_unknown_override_target_without_close_term() {
        let symptoms = symptoms().with_overrides(vec![OverrideRule::map_to("agia", "Dor")]);
        match CanonConfig::new("1", vec![symptoms]).unwrap_err() {
            ConfigError::UnknownOverrideTarget { suggestion, .. } => assert_eq!(suggestion, None),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_duplicate_domain_rejected() {
        let err = CanonConfig::new("1", vec![symptoms(), symptoms()]).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateDomain("symptoms".to_string()));
    }

    #[test]
    fn test_duplicate_folded_term_rejected() {
        let domain = DomainConfig::new("symptoms", Vocabulary::new(["Nausea", "Náusea"]));
        assert!(matches!(
            CanonConfig::new("1", vec![domain]),
            Err(ConfigError::DuplicateTerm { .. })
        ));
    }

    #[test]
    fn test_empty_vocabulary_rejected() {
        let domain = DomainConfig::new("symptoms", Vocabulary::default());
        assert!(matches!(
            CanonConfig::new("1", vec![domain]),
            Err(ConfigError::EmptyVocabulary { .. })
        ));
    }

    #[test]
    fn test_blank_override_key_reports_raw_text() {
        let symptoms = symptoms().with_overrides(vec![OverrideRule::suppress(" \u{301} ")]);
        assert_eq!(
            CanonConfig::new("1", vec![symptoms]).unwrap_err(),
            ConfigError::EmptyOverrideKey {
                raw: " \u{301} ".to_string()
            }
        );
    }

    #[test]
    fn test_blank_blocklist_entry_reports_raw_text() {
        let blocklist = Blocklist::new(["exame"]).merged(&Blocklist::new(["covid", "  "]));
        assert_eq!(blocklist.entries(), &["exame", "covid"]);
        assert_eq!(blocklist.blank_entries(), &["  "]);

        let symptoms = symptoms().with_blocklist(blocklist);
        assert_eq!(
            CanonConfig::new("1", vec![symptoms]).unwrap_err(),
            ConfigError::EmptyBlocklistEntry {
                raw: "  ".to_string()
            }
        );
    }

    #[test]
    fn test_domain_lookup() {
        let config = CanonConfig::new("1", vec![symptoms(), conditions()]).unwrap();
        assert_eq!(config.domain("conditions").unwrap().name, "conditions");
        assert_eq!(
            config.domain("vaccines").unwrap_err(),
            ConfigError::UnknownDomain("vaccines".to_string())
        );
    }
}

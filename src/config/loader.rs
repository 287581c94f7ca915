//! Configuration loader
//!
//! Loads `canon.yaml` and compiles it into a validated [`CanonConfig`].
//! Shared rules are layered under each domain's own rules: a domain's
//! overrides are evaluated first, then the shared overrides, in file order.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::types::{
    Blocklist, CanonConfig, ColumnSpec, DomainConfig, OverrideRule, TableNames, Vocabulary,
};
use crate::canon::normalize::normalize;
use crate::error::ConfigError;

/// Configuration bundled with the crate
const BUILTIN_CONFIG: &str = include_str!("../../config/canon.yaml");

const CONFIG_FILE: &str = "canon.yaml";

// =============================================================================
// FILE FORMAT
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    shared: RuleSection,
    domains: Vec<DomainSection>,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSection {
    #[serde(default)]
    blocklist: Vec<String>,
    #[serde(default)]
    overrides: Vec<OverrideEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OverrideEntry {
    key: String,
    #[serde(default)]
    map_to: Option<String>,
    #[serde(default)]
    suppress: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DomainSection {
    name: String,
    vocabulary: Vec<String>,
    #[serde(default)]
    blocklist: Vec<String>,
    #[serde(default)]
    overrides: Vec<OverrideEntry>,
    #[serde(default)]
    columns: Option<ColumnsSection>,
    #[serde(default)]
    tables: Option<TablesSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnsSection {
    primary: Vec<String>,
    #[serde(default)]
    secondary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TablesSection {
    dimension: String,
    id_column: String,
    bridge: String,
}

// =============================================================================
// LOADER
// =============================================================================

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Create loader from CANON_CONFIG_DIR env var or default to "config"
    pub fn from_env() -> Self {
        let dir = std::env::var("CANON_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::new(dir)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load and validate `<config_dir>/canon.yaml`
    pub fn load(&self) -> Result<CanonConfig> {
        let path = self.config_dir.join(CONFIG_FILE);
        info!("Loading canonicalization config from {}", path.display());

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config =
            parse_config(&content).with_context(|| format!("Invalid config {}", path.display()))?;

        info!(
            "Loaded {} domains with {} total terms",
            config.domains().len(),
            config
                .domains()
                .iter()
                .map(|d| d.vocabulary.len())
                .sum::<usize>()
        );

        Ok(config)
    }
}

impl CanonConfig {
    /// The symptom and condition vocabularies shipped with the crate
    pub fn builtin() -> Result<Self> {
        parse_config(BUILTIN_CONFIG).context("Invalid built-in config")
    }
}

/// Parse and validate a YAML document.
///
/// Validation failures are [`ConfigError`]s wrapped in the returned error.
pub fn parse_config(content: &str) -> Result<CanonConfig> {
    let file: ConfigFile = serde_yaml::from_str(content).context("Failed to parse YAML")?;
    Ok(compile(file)?)
}

fn compile(file: ConfigFile) -> Result<CanonConfig, ConfigError> {
    let shared_overrides = compile_overrides(&file.shared.overrides)?;
    let shared_blocklist = compile_blocklist(&file.shared.blocklist)?;

    let mut domains = Vec::with_capacity(file.domains.len());
    for section in file.domains {
        let mut overrides = compile_overrides(&section.overrides)?;
        overrides.extend(shared_overrides.iter().cloned());

        let blocklist = compile_blocklist(&section.blocklist)?.merged(&shared_blocklist);

        let mut domain = DomainConfig::new(section.name, Vocabulary::new(section.vocabulary))
            .with_overrides(overrides)
            .with_blocklist(blocklist);

        if let Some(columns) = section.columns {
            domain.columns = ColumnSpec {
                primary: columns.primary,
                secondary: columns.secondary,
            };
        }
        if let Some(tables) = section.tables {
            domain.tables = TableNames {
                dimension: tables.dimension,
                id_column: tables.id_column,
                bridge: tables.bridge,
            };
        }

        domains.push(domain);
    }

    CanonConfig::new(file.version, domains)
}

fn compile_overrides(entries: &[OverrideEntry]) -> Result<Vec<OverrideRule>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            if normalize(&entry.key).is_empty() {
                return Err(ConfigError::EmptyOverrideKey {
                    raw: entry.key.clone(),
                });
            }
            match (&entry.map_to, entry.suppress) {
                (Some(term), false) => Ok(OverrideRule::map_to(&entry.key, term.clone())),
                (None, true) => Ok(OverrideRule::suppress(&entry.key)),
                _ => Err(ConfigError::AmbiguousOverride {
                    key: entry.key.clone(),
                }),
            }
        })
        .collect()
}

fn compile_blocklist(entries: &[String]) -> Result<Blocklist, ConfigError> {
    if let Some(raw) = entries.iter().find(|e| normalize(e).is_empty()) {
        return Err(ConfigError::EmptyBlocklistEntry { raw: raw.clone() });
    }
    Ok(Blocklist::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::OverrideAction;

    const MINIMAL: &str = r#"
shared:
  blocklist: [covid]
  overrides:
    - { key: cansaço, map_to: Fadiga }
    - { key: acidente, suppress: true }
domains:
  - name: symptoms
    vocabulary: [Febre, Fadiga]
    overrides:
      - { key: febril, map_to: Febre }
    blocklist: [Exame]
"#;

    #[test]
    fn test_builtin_config_loads() {
        let config = CanonConfig::builtin().unwrap();
        let names: Vec<&str> = config.domains().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["symptoms", "conditions"]);

        let conditions = config.domain("conditions").unwrap();
        assert_eq!(conditions.columns.primary, vec!["condicoes", "comorbidades"]);
        assert_eq!(conditions.tables.dimension, "condicao");
        assert!(conditions.vocabulary.contains("Profissional De Saude"));
    }

    #[test]
    fn test_domain_rules_precede_shared_rules() {
        let config = parse_config(MINIMAL).unwrap();
        let symptoms = config.domain("symptoms").unwrap();

        let keys: Vec<&str> = symptoms.overrides.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["febril", "cansaco", "acidente"]);
        assert_eq!(symptoms.overrides[2].action, OverrideAction::Suppress);
        assert_eq!(symptoms.blocklist.entries(), &["exame", "covid"]);
    }

    #[test]
    fn test_defaults_for_columns_and_tables() {
        let config = parse_config(MINIMAL).unwrap();
        let symptoms = config.domain("symptoms").unwrap();
        assert_eq!(symptoms.columns.primary, vec!["symptoms"]);
        assert_eq!(symptoms.tables.id_column, "symptoms_id");
    }

    #[test]
    fn test_override_without_action_rejected() {
        let yaml = r#"
domains:
  - name: symptoms
    vocabulary: [Febre]
    overrides:
      - { key: febril }
"#;
        let err = parse_config(yaml).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::AmbiguousOverride {
                key: "febril".to_string()
            })
        );
    }

    #[test]
    fn test_override_with_both_actions_rejected() {
        let yaml = r#"
domains:
  - name: symptoms
    vocabulary: [Febre]
    overrides:
      - { key: febril, map_to: Febre, suppress: true }
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::AmbiguousOverride { .. })
        ));
    }

    #[test]
    fn test_blank_blocklist_entry_rejected() {
        let yaml = r#"
shared:
  blocklist: ["  "]
domains:
  - name: symptoms
    vocabulary: [Febre]
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::EmptyBlocklistEntry { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
domains:
  - name: symptoms
    vocabulary: [Febre]
    synonyms: [febril]
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_loader_reads_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("canon.yaml"), MINIMAL).unwrap();

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.domains().len(), 1);
    }

    #[test]
    fn test_loader_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("canon.yaml"));
    }
}

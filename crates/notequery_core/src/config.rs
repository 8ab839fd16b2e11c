//! JSON configuration document.
//!
//! # Responsibility
//! - Deserialize the engine configuration and validate it before use.
//! - Resolve relative paths against the directory of the config file.
//!
//! # Invariants
//! - Unknown keys are rejected at every level.
//! - Field names are unique after trimming; their order is registration
//!   order in the corpus store.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Configuration load or validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// One knowledge domain served by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    /// Store key of the field.
    pub name: String,
    /// Human-readable display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Placeholder text for the field's search box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_prompt: Option<String>,
}

impl FieldConfig {
    /// Returns the alias, falling back to the name.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level_string")]
    pub level: String,
    /// Log directory; logging stays disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level_string(),
            dir: None,
        }
    }
}

fn default_level_string() -> String {
    default_log_level().to_string()
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    pub database_path: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<usize>,
}

impl EngineConfig {
    /// Reads, parses and validates the config at `path`.
    ///
    /// Relative `database_path` and `logging.dir` values are resolved
    /// against the directory containing `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&raw)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parses and validates a config document without touching the disk.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path cannot be empty".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            let name = field.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid("field name cannot be empty".to_string()));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!("duplicate field `{name}`")));
            }
        }

        normalize_level(&self.logging.level).map_err(ConfigError::Invalid)?;
        if self.default_limit == Some(0) {
            return Err(ConfigError::Invalid(
                "default_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Looks up a configured field by name.
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|field| field.name.trim() == name)
    }

    /// Configured field names in registration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.trim())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.database_path.is_relative() {
            self.database_path = base.join(&self.database_path);
        }
        if let Some(dir) = self.logging.dir.as_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use std::path::PathBuf;

    #[test]
    fn parses_full_document() {
        let config = EngineConfig::from_json_str(
            r#"{
                "fields": [
                    {"name": "ml", "alias": "Machine Learning", "search_prompt": "Try: attention"},
                    {"name": "cs"}
                ],
                "database_path": "corpus.sqlite3",
                "logging": {"level": "warning", "dir": "/var/log/notequery"},
                "default_limit": 20
            }"#,
        )
        .unwrap();

        assert_eq!(config.field_names().collect::<Vec<_>>(), vec!["ml", "cs"]);
        assert_eq!(config.field("ml").unwrap().display_name(), "Machine Learning");
        assert_eq!(config.field("cs").unwrap().display_name(), "cs");
        assert_eq!(config.default_limit, Some(20));
        assert_eq!(config.logging.dir, Some(PathBuf::from("/var/log/notequery")));
    }

    #[test]
    fn defaults_apply_to_optional_sections() {
        let config = EngineConfig::from_json_str(r#"{"database_path": "c.db"}"#).unwrap();
        assert!(config.fields.is_empty());
        assert!(config.logging.dir.is_none());
        assert!(config.default_limit.is_none());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"database_path": "c.db", "color": true}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(
                r#"{"database_path": "c.db", "fields": [{"name": "ml"}, {"name": " ml "}]}"#
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(
                r#"{"database_path": "c.db", "logging": {"level": "loud"}}"#
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"database_path": "c.db", "default_limit": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notequery.json");
        std::fs::write(
            &path,
            r#"{"database_path": "data/corpus.db", "logging": {"level": "info", "dir": "logs"}}"#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.database_path, dir.path().join("data/corpus.db"));
        assert_eq!(config.logging.dir, Some(dir.path().join("logs")));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

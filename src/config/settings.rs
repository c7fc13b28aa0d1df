//! TOML-based configuration for the validator.
//!
//! Supports a config file (osi.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [rules]
//! aggregate_functions = ["sum", "avg", "count", "min", "max"]
//! extra_aggregate_functions = ["approx_*", "median"]
//! non_aggregate_metric = "warning"   # error | warning | off
//! check_balanced_expressions = true
//! self_reference = true
//! sql_dialect = "${OSI_SQL_DIALECT}"
//! check_dialect_expressions = true
//!
//! [batch]
//! max_workers = 8
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::Severity;
use crate::expr::{AllowListAggregateRule, SqlDialect};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Validation rule settings.
    pub rules: RuleSettings,

    /// Batch validation settings.
    pub batch: BatchSettings,
}

/// How a configurable rule reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    Error,
    Warning,
    Off,
}

impl RuleLevel {
    /// Severity to report with, `None` when the rule is off.
    pub fn severity(self) -> Option<Severity> {
        match self {
            RuleLevel::Error => Some(Severity::Error),
            RuleLevel::Warning => Some(Severity::Warning),
            RuleLevel::Off => None,
        }
    }
}

/// Validation rule settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleSettings {
    /// Functions that make a metric expression an aggregate. A trailing `*`
    /// matches any suffix.
    pub aggregate_functions: Vec<String>,

    /// Added to `aggregate_functions`.
    pub extra_aggregate_functions: Vec<String>,

    /// Level of the non-aggregate metric check.
    pub non_aggregate_metric: RuleLevel,

    /// Report unbalanced brackets and quotes in expressions.
    pub check_balanced_expressions: bool,

    /// Warn when an expression is exactly the name of a sibling entity.
    pub self_reference: bool,

    /// Dialect for the SQL syntax check (supports ${ENV_VAR} expansion).
    /// The check is off when unset.
    pub sql_dialect: Option<String>,

    /// SQL check each entry of an `expression.dialects` list in its own
    /// dialect. MDX and Tableau entries are never checked.
    pub check_dialect_expressions: bool,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            aggregate_functions: AllowListAggregateRule::STANDARD
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extra_aggregate_functions: Vec::new(),
            non_aggregate_metric: RuleLevel::Error,
            check_balanced_expressions: true,
            self_reference: true,
            sql_dialect: None,
            check_dialect_expressions: true,
        }
    }
}

impl RuleSettings {
    /// The configured aggregate allow-list.
    pub fn aggregate_rule(&self) -> AllowListAggregateRule {
        AllowListAggregateRule::new(
            self.aggregate_functions
                .iter()
                .chain(&self.extra_aggregate_functions),
        )
    }

    /// The configured SQL dialect, if any. Fails on an unknown name.
    pub fn dialect(&self) -> Result<Option<SqlDialect>, String> {
        self.sql_dialect
            .as_deref()
            .map(str::parse::<SqlDialect>)
            .transpose()
    }
}

/// Batch validation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Maximum number of documents validated at once.
    pub max_workers: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading settings");
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text, expanding environment variables.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;
        if let Some(dialect) = &settings.rules.sql_dialect {
            settings.rules.sql_dialect = Some(expand_env_vars(dialect)?);
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `OSI_CONFIG`
    /// 2. `./osi.toml`
    /// 3. `~/.config/osi/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        // Check environment variable first
        if let Ok(path) = env::var("OSI_CONFIG") {
            return Self::from_file(&path);
        }

        // Check local directory
        let local_config = PathBuf::from("osi.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("osi").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.batch.max_workers == 0 {
            return Err(SettingsError::InvalidConfig(
                "batch.max_workers must be at least 1".to_string(),
            ));
        }
        self.rules.dialect().map_err(SettingsError::InvalidConfig)?;
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        // Check for ${VAR} or $VAR
        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR (ends at non-alphanumeric/underscore)
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }
        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

//! Configuration module.
//!
//! Handles the optional `osi.toml` settings file and environment variables.

mod settings;

pub use settings::{
    expand_env_vars, BatchSettings, RuleLevel, RuleSettings, Settings, SettingsError,
};

//! Configuration loading, validation and env substitution.
//!
//! Config files: `relaydesk.toml`, `relaydesk.yaml` or `relaydesk.json`,
//! searched in `./` then `~/.config/relaydesk/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, data_dir, discover_and_load, load_config},
    schema::{
        DatabaseConfig, IntakeConfig, MediaConfig, MetricsConfig, RelaydeskConfig, TelegramConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};

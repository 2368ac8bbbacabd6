// crates/delta-ledger-config/src/loader.rs
// ============================================================================
// Module: Config Loader
// Description: Locates, reads, and parses the ledger configuration file.
// Purpose: Turn an explicit, env-provided, or default path into a validated config.
// Dependencies: delta-ledger-config model and env modules, toml
// ============================================================================

//! ## Overview
//! Loading resolves the file location (explicit path first, then the
//! `DELTA_LEDGER_CONFIG` environment variable, then `delta-ledger.toml` in
//! the working directory), enforces path and size limits, reads the file as
//! UTF-8, substitutes `${VAR}` references inside string values, and only
//! then deserializes and validates. A config that loads is a config the
//! runtime can run with.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::env::substitute_env_refs;
use crate::model::ConfigError;
use crate::model::LedgerConfig;
use crate::model::validate_path_limits;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "delta-ledger.toml";

/// Environment variable naming an alternate configuration file.
pub const CONFIG_ENV_VAR: &str = "DELTA_LEDGER_CONFIG";

/// Maximum accepted configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Loading
// ============================================================================

impl LedgerConfig {
    /// Loads and validates the configuration file.
    ///
    /// Pass `None` to fall back to [`CONFIG_ENV_VAR`] and then
    /// [`DEFAULT_CONFIG_NAME`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read,
    /// [`ConfigError::Parse`] on malformed TOML, and
    /// [`ConfigError::Invalid`] when limits or validation fail.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        validate_path_limits("config path", &resolved)?;
        let raw = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("cannot read {}: {err}", resolved.display())))?;
        if raw.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let text = String::from_utf8(raw)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Parses configuration from TOML text, with environment substitution
    /// and validation applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or a shape mismatch,
    /// and [`ConfigError::Invalid`] on unresolved references or validation
    /// failures.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut value: toml::Value =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        substitute_env_refs(&mut value)?;
        let config: Self = value.try_into().map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the configuration file path from the explicit argument, the
/// environment override, or the default name, in that order.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    if let Some(env_path) = env::var_os(CONFIG_ENV_VAR) {
        return PathBuf::from(env_path);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

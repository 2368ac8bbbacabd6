// crates/delta-ledger-config/tests/common/mod.rs
// ============================================================================
// Module: Config Test Helpers
// Description: Shared fixtures and assertions for config tests.
// Purpose: Reduce duplication across delta-ledger-config integration tests.
// ============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::fs;

use delta_ledger_config::ConfigError;
use tempfile::NamedTempFile;

/// Test outcome alias used across the config suites.
pub type TestResult = Result<(), String>;

/// Smallest configuration that loads successfully.
pub const MINIMAL_CONFIG: &str = "[store]\npath = \"ledger.db\"\n";

/// Writes the contents to a fresh temporary file.
pub fn write_config(contents: &str) -> Result<NamedTempFile, String> {
    let file = NamedTempFile::new().map_err(|err| err.to_string())?;
    fs::write(file.path(), contents).map_err(|err| err.to_string())?;
    Ok(file)
}

/// Asserts that the result is an error whose message contains the needle.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Ok(_) => Err(format!("expected rejection mentioning {needle}")),
        Err(err) => {
            let text = err.to_string();
            if text.contains(needle) {
                Ok(())
            } else {
                Err(format!("unexpected error: {text}"))
            }
        }
    }
}

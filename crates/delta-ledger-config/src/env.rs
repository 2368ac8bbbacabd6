// crates/delta-ledger-config/src/env.rs
// ============================================================================
// Module: Environment Substitution
// Description: `${VAR}` expansion inside parsed configuration values.
// Purpose: Resolve environment references before deserialization.
// Dependencies: crate::model, toml
// ============================================================================

//! ## Overview
//! Substitution runs on the parsed TOML tree, not the raw text, so comments
//! and keys are never rewritten. Only string values are expanded; a number
//! or boolean never hides a reference. `${NAME}` resolves against the
//! process environment and fails closed: an unset variable or a malformed
//! reference rejects the whole config rather than passing a literal
//! placeholder downstream. Text without `${` passes through untouched, so a
//! lone `$` needs no escaping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;

use crate::model::ConfigError;

// ============================================================================
// SECTION: Substitution
// ============================================================================

/// Expands `${VAR}` references in every string value of the tree.
pub(crate) fn substitute_env_refs(value: &mut toml::Value) -> Result<(), ConfigError> {
    match value {
        toml::Value::String(text) => {
            *text = substitute_text(text)?;
        }
        toml::Value::Array(items) => {
            for item in items {
                substitute_env_refs(item)?;
            }
        }
        toml::Value::Table(table) => {
            for (_name, item) in table.iter_mut() {
                substitute_env_refs(item)?;
            }
        }
        toml::Value::Integer(_)
        | toml::Value::Float(_)
        | toml::Value::Boolean(_)
        | toml::Value::Datetime(_) => {}
    }
    Ok(())
}

/// Expands `${VAR}` references in one string value.
fn substitute_text(text: &str) -> Result<String, ConfigError> {
    if !text.contains("${") {
        return Ok(text.to_string());
    }
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::Invalid(
                "malformed environment reference: missing closing brace".to_string(),
            ));
        };
        let name = &after[..end];
        if !is_env_name(name) {
            return Err(ConfigError::Invalid(format!(
                "malformed environment reference: ${{{name}}}"
            )));
        }
        match env::var(name) {
            Ok(resolved) => output.push_str(&resolved),
            Err(_) => {
                return Err(ConfigError::Invalid(format!(
                    "unresolved environment reference: ${{{name}}}"
                )));
            }
        }
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

/// Returns true when the name is a valid environment variable reference.
fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

//! Runtime secret resolution.
//!
//! Config YAML stores env var NAMES only (`sor.keys_env.api_key`). Callers
//! resolve once at startup and pass [`ResolvedSecrets`] into constructors.
//! `Debug` output redacts values and errors name the variable, never its value.

use anyhow::{bail, Result};
use serde_json::Value;

const DEFAULT_SOR_API_KEY_VAR: &str = "CREG_SOR_API_KEY";

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// System-of-record API key. `None` if the named env var was absent or empty.
    pub sor_api_key: Option<String>,
    /// Name the key was read from; safe to log.
    pub sor_api_key_var: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("sor_api_key", &self.sor_api_key.as_ref().map(|_| "<REDACTED>"))
            .field("sor_api_key_var", &self.sor_api_key_var)
            .finish()
    }
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve secrets named in `config_json`.
///
/// With `require_sor_key` set, a missing key is an error naming the variable.
/// Offline commands (validate, audit verify) pass `false`.
pub fn resolve_secrets(config_json: &Value, require_sor_key: bool) -> Result<ResolvedSecrets> {
    let var = read_str_at(config_json, "/sor/keys_env/api_key")
        .unwrap_or_else(|| DEFAULT_SOR_API_KEY_VAR.to_string());
    let key = resolve_env(&var);

    if require_sor_key && key.is_none() {
        bail!(
            "SECRETS_MISSING: required env var '{}' (sor api_key) is not set or empty",
            var
        );
    }

    Ok(ResolvedSecrets {
        sor_api_key: key,
        sor_api_key_var: var,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_value() {
        let s = ResolvedSecrets {
            sor_api_key: Some("super-secret-value".to_string()),
            sor_api_key_var: "X".to_string(),
        };
        let dbg = format!("{s:?}");
        assert!(dbg.contains("<REDACTED>"));
        assert!(!dbg.contains("super-secret-value"));
    }

    #[test]
    fn missing_required_key_names_the_variable() {
        let cfg = serde_json::json!({
            "sor": { "keys_env": { "api_key": "CREG_TEST_SOR_KEY_DEFINITELY_UNSET_41" } }
        });
        let err = resolve_secrets(&cfg, true).unwrap_err().to_string();
        assert!(err.contains("CREG_TEST_SOR_KEY_DEFINITELY_UNSET_41"));
    }

    #[test]
    fn optional_key_absent_is_ok() {
        let cfg = serde_json::json!({
            "sor": { "keys_env": { "api_key": "CREG_TEST_SOR_KEY_DEFINITELY_UNSET_42" } }
        });
        let s = resolve_secrets(&cfg, false).unwrap();
        assert!(s.sor_api_key.is_none());
        assert_eq!(s.sor_api_key_var, "CREG_TEST_SOR_KEY_DEFINITELY_UNSET_42");
    }
}

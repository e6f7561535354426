use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::LoadedConfig;

/// Typed view of the merged configuration.
///
/// Every section has defaults so an empty document yields a usable pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub sor: SorSettings,
    #[serde(default)]
    pub audit: AuditSettings,
}

impl PipelineSettings {
    pub fn from_loaded(cfg: &LoadedConfig) -> Result<Self> {
        let settings: PipelineSettings = serde_json::from_value(cfg.config_json.clone())
            .context("config does not match PipelineSettings")?;
        settings.check()?;
        Ok(settings)
    }

    /// Reject values that would disable a safety bound.
    pub fn check(&self) -> Result<()> {
        if self.sync.max_attempts == 0 {
            bail!("sync.max_attempts must be >= 1");
        }
        if self.sync.initial_backoff_ms > self.sync.max_backoff_ms {
            bail!(
                "sync.initial_backoff_ms ({}) exceeds sync.max_backoff_ms ({})",
                self.sync.initial_backoff_ms,
                self.sync.max_backoff_ms
            );
        }
        if self.matching.matcher_timeout_ms == 0 || self.validation.rule_timeout_ms == 0 {
            bail!("validator and matcher timeouts must be > 0");
        }
        for (name, p) in
            std::iter::once(("default", &self.rate_limit.default)).chain(
                self.rate_limit
                    .providers
                    .iter()
                    .map(|(k, v)| (k.as_str(), v)),
            )
        {
            if p.window_secs == 0 {
                bail!("rate_limit policy '{name}' has window_secs = 0");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSettings {
    #[serde(default = "default_rule_timeout_ms")]
    pub rule_timeout_ms: u64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            rule_timeout_ms: default_rule_timeout_ms(),
        }
    }
}

impl ValidationSettings {
    pub fn rule_timeout(&self) -> Duration {
        Duration::from_millis(self.rule_timeout_ms)
    }
}

fn default_rule_timeout_ms() -> u64 {
    2_000
}

// ---------------------------------------------------------------------------
// rate_limit
// ---------------------------------------------------------------------------

/// Submission throttle for one identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub window_secs: u64,
    pub max_submissions: u32,
}

impl RateLimitPolicy {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window_secs: 86_400,
            max_submissions: 5,
        }
    }
}

/// Provider → policy table. Lookup is case-insensitive and falls back to
/// `default` for providers without an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default)]
    pub default: RateLimitPolicy,
    #[serde(default)]
    pub providers: BTreeMap<String, RateLimitPolicy>,
}

impl RateLimitSettings {
    pub fn policy_for(&self, provider: &str) -> RateLimitPolicy {
        let wanted = provider.trim();
        self.providers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
            .map(|(_, v)| *v)
            .unwrap_or(self.default)
    }
}

// ---------------------------------------------------------------------------
// matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_matcher_timeout_ms")]
    pub matcher_timeout_ms: u64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            matcher_timeout_ms: default_matcher_timeout_ms(),
        }
    }
}

impl MatchingSettings {
    pub fn matcher_timeout(&self) -> Duration {
        Duration::from_millis(self.matcher_timeout_ms)
    }
}

fn default_matcher_timeout_ms() -> u64 {
    5_000
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

/// Attempt budget for the read-after-write visibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

// ---------------------------------------------------------------------------
// sor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SorSettings {
    #[serde(default = "default_sor_base_url")]
    pub base_url: String,
    #[serde(default = "default_sor_timeout_ms")]
    pub timeout_ms: u64,
    /// Env var NAMES, never values.
    #[serde(default)]
    pub keys_env: SorKeysEnv,
}

impl Default for SorSettings {
    fn default() -> Self {
        Self {
            base_url: default_sor_base_url(),
            timeout_ms: default_sor_timeout_ms(),
            keys_env: SorKeysEnv::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SorKeysEnv {
    #[serde(default = "default_sor_api_key_env")]
    pub api_key: String,
}

impl Default for SorKeysEnv {
    fn default() -> Self {
        Self {
            api_key: default_sor_api_key_env(),
        }
    }
}

fn default_sor_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_sor_timeout_ms() -> u64 {
    10_000
}

fn default_sor_api_key_env() -> String {
    "CREG_SOR_API_KEY".to_string()
}

// ---------------------------------------------------------------------------
// audit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSettings {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_true")]
    pub hash_chain: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            path: None,
            hash_chain: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_layered_yaml_from_strings;

    #[test]
    fn empty_config_yields_defaults() {
        let cfg = load_layered_yaml_from_strings(&["{}"]).unwrap();
        let s = PipelineSettings::from_loaded(&cfg).unwrap();
        assert_eq!(s, PipelineSettings::default());
        assert_eq!(s.rate_limit.default.max_submissions, 5);
    }

    #[test]
    fn provider_policy_lookup_is_case_insensitive_with_fallback() {
        let cfg = load_layered_yaml_from_strings(&[r#"
rate_limit:
  default: { window_secs: 3600, max_submissions: 10 }
  providers:
    bcsc: { window_secs: 86400, max_submissions: 2 }
"#])
        .unwrap();
        let s = PipelineSettings::from_loaded(&cfg).unwrap();
        assert_eq!(s.rate_limit.policy_for("BCSC").max_submissions, 2);
        assert_eq!(s.rate_limit.policy_for("bceidbusiness").max_submissions, 10);
        assert_eq!(
            s.rate_limit.policy_for("idir").window(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn zero_attempt_budget_is_rejected() {
        let cfg = load_layered_yaml_from_strings(&["sync:\n  max_attempts: 0\n"]).unwrap();
        assert!(PipelineSettings::from_loaded(&cfg).is_err());
    }

    #[test]
    fn backoff_floor_above_ceiling_is_rejected() {
        let cfg = load_layered_yaml_from_strings(&[
            "sync:\n  initial_backoff_ms: 9000\n  max_backoff_ms: 100\n",
        ])
        .unwrap();
        assert!(PipelineSettings::from_loaded(&cfg).is_err());
    }
}

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::leaves;

/// JSON-pointer prefixes read by [`crate::PipelineSettings`] and
/// [`crate::secrets`]. A leaf outside all of them is unused.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/validation/rule_timeout_ms",
    "/rate_limit/default",
    "/rate_limit/providers",
    "/matching/matcher_timeout_ms",
    "/sync/max_attempts",
    "/sync/initial_backoff_ms",
    "/sync/max_backoff_ms",
    "/sor/base_url",
    "/sor/timeout_ms",
    "/sor/keys_env/api_key",
    "/audit/path",
    "/audit/hash_chain",
];

const PREVIEW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub consumed_prefixes: Vec<String>,
    /// Sorted, unique.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

fn tokens(ptr: &str) -> Vec<&str> {
    ptr.split('/').filter(|t| !t.is_empty()).collect()
}

/// `/sync` covers `/sync` and `/sync/x` but not `/syncing`.
fn covers(prefix: &[&str], leaf: &[&str]) -> bool {
    leaf.len() >= prefix.len() && leaf[..prefix.len()] == *prefix
}

/// List config leaves that no code reads. [`UnusedKeyPolicy::Fail`] turns a
/// non-empty list into an error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut consumed_prefixes: Vec<String> = CONSUMED_POINTERS
        .iter()
        .map(|p| format!("/{}", tokens(p).join("/")))
        .collect();
    consumed_prefixes.sort();
    consumed_prefixes.dedup();

    let prefix_tokens: Vec<Vec<&str>> = consumed_prefixes.iter().map(|p| tokens(p)).collect();
    let mut unused: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| {
            let leaf = tokens(ptr);
            !prefix_tokens.iter().any(|p| covers(p, &leaf))
        })
        .collect();
    unused.sort();
    unused.dedup();

    if policy == UnusedKeyPolicy::Fail && !unused.is_empty() {
        let preview: Vec<&String> = unused.iter().take(PREVIEW).collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s); remove them or register a consumer. First few: {:?}",
            unused.len(),
            preview
        );
    }

    Ok(UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    })
}

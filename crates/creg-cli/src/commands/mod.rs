//! Command handler modules for creg-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod audit;
pub mod pipeline;
pub mod validate;

use anyhow::{Context, Result};
use creg_config::{PipelineSettings, UnusedKeyPolicy};
use creg_schemas::SubmissionDraft;
use std::fs;
use tracing::{info, warn};

/// Read a draft from a JSON file. A UTF-8 BOM is tolerated.
pub fn load_draft(path: &str) -> Result<SubmissionDraft> {
    let bytes = fs::read(path).with_context(|| format!("read draft failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw: serde_json::Value =
        serde_json::from_slice(bytes).with_context(|| format!("draft is not valid JSON: {path}"))?;
    creg_validation::parse_draft(&raw)
        .map_err(|r| anyhow::anyhow!("{path}: {}: {}", r.field, r.message))
}

/// Load layered config, warn on unused keys, and build typed settings.
pub fn load_settings(paths: &[String]) -> Result<(PipelineSettings, serde_json::Value)> {
    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = creg_config::load_layered_yaml(&refs)?;
    let report = creg_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &report.unused_leaf_pointers {
        warn!(pointer = %p, "unused config key");
    }
    let settings = PipelineSettings::from_loaded(&loaded)?;
    info!(config_hash = %loaded.config_hash, "config loaded");
    Ok((settings, loaded.config_json))
}

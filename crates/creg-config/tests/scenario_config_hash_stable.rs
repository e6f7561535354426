//! Config hash stability.
//!
//! GREEN when:
//! - identical inputs hash identically;
//! - key order inside a document does not change the hash;
//! - different values hash differently;
//! - overlays take effect and the merged hash is stable.

use creg_config::{load_layered_yaml_from_strings, PipelineSettings};

const BASE_YAML: &str = r#"
validation:
  rule_timeout_ms: 2000
rate_limit:
  default: { window_secs: 86400, max_submissions: 5 }
  providers:
    bcsc: { window_secs: 86400, max_submissions: 2 }
sync:
  max_attempts: 5
  initial_backoff_ms: 200
  max_backoff_ms: 5000
sor:
  base_url: "http://localhost:8080"
  keys_env:
    api_key: "CREG_SOR_API_KEY"
"#;

const BASE_YAML_REORDERED: &str = r#"
sor:
  keys_env:
    api_key: "CREG_SOR_API_KEY"
  base_url: "http://localhost:8080"
sync:
  max_backoff_ms: 5000
  initial_backoff_ms: 200
  max_attempts: 5
rate_limit:
  providers:
    bcsc: { max_submissions: 2, window_secs: 86400 }
  default: { max_submissions: 5, window_secs: 86400 }
validation:
  rule_timeout_ms: 2000
"#;

const OVERLAY_YAML: &str = r#"
sync:
  max_attempts: 8
sor:
  base_url: "https://sor.internal"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex digest");
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordering keys must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_takes_effect_and_keeps_siblings() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);

    let s = PipelineSettings::from_loaded(&a).unwrap();
    assert_eq!(s.sync.max_attempts, 8);
    assert_eq!(s.sync.initial_backoff_ms, 200, "sibling keys survive the merge");
    assert_eq!(s.sor.base_url, "https://sor.internal");
    assert_eq!(s.rate_limit.policy_for("bcsc").max_submissions, 2);
}

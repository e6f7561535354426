//! creg-config
//!
//! Layered YAML configuration for the submission pipeline. Documents merge
//! in order, later layers winning key by key. The merged tree is refused if
//! any string leaf looks like a credential, then hashed over its canonical
//! JSON so two deployments can prove they run the same rules.
//!
//! Typed access goes through [`PipelineSettings`]; secrets are resolved from
//! the environment through [`secrets`].

mod consumption;
mod layers;
pub mod secrets;
mod settings;

pub use consumption::{report_unused_keys, UnusedKeyPolicy, UnusedKeyReport, CONSUMED_POINTERS};
pub use layers::{load_layered_yaml, load_layered_yaml_from_strings, LoadedConfig};
pub use settings::*;

use serde_json::Value;

/// Every scalar (or empty container) in `v` with its JSON pointer, in key
/// order. The root scalar is reported as `/`.
pub(crate) fn leaves(v: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), v)];
    while let Some((ptr, node)) = stack.pop() {
        let children: Vec<(String, &Value)> = match node {
            Value::Object(map) if !map.is_empty() => map
                .iter()
                .map(|(k, child)| (format!("{ptr}/{}", k.replace('~', "~0").replace('/', "~1")), child))
                .collect(),
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .enumerate()
                .map(|(i, child)| (format!("{ptr}/{i}"), child))
                .collect(),
            _ => {
                out.push((if ptr.is_empty() { "/".to_string() } else { ptr }, node));
                continue;
            }
        };
        // reversed so the stack pops in key order
        stack.extend(children.into_iter().rev());
    }
    out
}

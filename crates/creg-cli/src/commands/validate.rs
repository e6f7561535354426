use std::sync::Arc;

use anyhow::{bail, Result};
use creg_config::ValidationSettings;
use creg_schemas::ValidationSource;
use creg_validation::validators::standard_engine;
use creg_validation::StaticReferenceData;

use super::load_draft;

/// Offline validation: built-in code tables, no rate limit, no network.
///
/// Prints `valid=true` or one JSON rule result per line and fails.
pub async fn run(path: &str, source: ValidationSource) -> Result<()> {
    let draft = load_draft(path)?;
    let engine = standard_engine(
        Arc::new(StaticReferenceData::with_defaults()),
        None,
        ValidationSettings::default().rule_timeout(),
    );

    match engine.validate(draft, source).await {
        Ok(_) => {
            println!("valid=true source={source}");
            Ok(())
        }
        Err(rejection) => {
            let errors = rejection.into_results();
            println!("valid=false source={source} errors={}", errors.len());
            for e in &errors {
                println!("{}", serde_json::to_string(e)?);
            }
            bail!("{path}: {} rule violation(s)", errors.len());
        }
    }
}

use std::sync::Arc;

use creg_config::PipelineSettings;
use creg_matching::matchers::standard_matchers;
use creg_matching::{ClientSearch, MatchingEngine};
use creg_validation::validators::standard_engine;
use creg_validation::{RateLimiter, ReferenceData};

use crate::{Notifier, Pipeline, PipelineParts, RetryPolicy, StoreHistory, SubmissionStore, SyncClient};

/// Assemble a pipeline with the standard rule set, the standard matchers,
/// and a rate limiter over `store`'s submission history.
pub fn standard_pipeline(
    settings: &PipelineSettings,
    reference: Arc<dyn ReferenceData>,
    search: Arc<dyn ClientSearch>,
    store: Arc<dyn SubmissionStore>,
    sync: Arc<dyn SyncClient>,
    notifier: Arc<dyn Notifier>,
) -> Pipeline {
    let limiter = RateLimiter::new(
        settings.rate_limit.clone(),
        Arc::new(StoreHistory(store.clone())),
    );
    let validation = standard_engine(
        reference,
        Some(search.clone()),
        settings.validation.rule_timeout(),
    )
    .with_rate_limiter(limiter);
    let matching = MatchingEngine::new(
        standard_matchers(search),
        settings.matching.matcher_timeout(),
    );

    Pipeline::new(PipelineParts {
        validation: Arc::new(validation),
        matching: Arc::new(matching),
        store,
        sync,
        notifier,
        retry: RetryPolicy::from_settings(&settings.sync),
    })
}

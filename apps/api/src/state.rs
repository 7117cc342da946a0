use std::sync::Arc;

use crate::llm_client::EvaluationProvider;
use crate::timing::ResponseTimeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Anthropic direct or Bedrock, chosen at startup from MODEL_PROVIDER.
    pub provider: Arc<dyn EvaluationProvider>,
    /// In-memory ring buffer, or a JSON file when RESPONSE_TIMES_PATH is set.
    pub timings: Arc<dyn ResponseTimeStore>,
}

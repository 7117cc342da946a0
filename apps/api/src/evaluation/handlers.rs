//! Axum route handlers for the Evaluation API.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::evaluation::evaluator::{evaluate_story, EvaluateRequest, EvaluateResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageResponseTime {
    /// Milliseconds.
    pub average_response_time: u64,
    pub provider: &'static str,
    pub model: String,
}

/// POST /generate
///
/// Evaluates a STAR story, optionally with a bar-raiser review.
/// A model answer that cannot be parsed still returns 200 with `parseError` set.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let response =
        evaluate_story(state.provider.as_ref(), state.timings.as_ref(), request).await?;
    Ok(Json(response))
}

/// GET /api/average-response-time
///
/// Rolling average of recent provider latency, used by the client to pace its progress bar.
pub async fn handle_average_response_time(
    State(state): State<AppState>,
) -> Json<AverageResponseTime> {
    let average = state.timings.average().await;
    Json(AverageResponseTime {
        average_response_time: u64::try_from(average.as_millis()).unwrap_or(u64::MAX),
        provider: state.provider.name(),
        model: state.provider.model().to_string(),
    })
}

//! Evaluation pipeline.
//!
//! Flow: build prompts → provider call(s) → record elapsed time →
//!       normalize the standard answer → normalize the bar-raiser answer.
//!
//! The standard and bar-raiser prompts run concurrently. A provider failure
//! on either fails the whole evaluation; parse failures do not.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluation::bar_raiser::normalize_bar_raiser;
use crate::evaluation::display::{format_assessment, AssessmentClass};
use crate::evaluation::models::{BarRaiserRecord, EvaluationRecord};
use crate::evaluation::normalizer::normalize_evaluation;
use crate::evaluation::prompts::{build_bar_raiser_prompt, build_evaluation_prompt, StoryContext};
use crate::llm_client::EvaluationProvider;
use crate::timing::ResponseTimeStore;

pub const MAX_STORY_CHARS: usize = 10_000;
pub const MAX_QUESTION_CHARS: usize = 500;
pub const MAX_JOB_TITLE_CHARS: usize = 200;

pub const PARSE_FAILURE_MESSAGE: &str =
    "Could not parse the evaluation. Please try again.";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub story: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub include_bar_raiser: bool,
}

/// Normalized evaluation plus the score the display layer must show.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationView {
    #[serde(flatten)]
    pub record: EvaluationRecord,
    pub calculated_total_score: u32,
}

impl From<EvaluationRecord> for EvaluationView {
    fn from(record: EvaluationRecord) -> Self {
        Self {
            calculated_total_score: record.total_score,
            record,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarRaiserView {
    #[serde(flatten)]
    pub record: BarRaiserRecord,
    pub assessment_class: AssessmentClass,
    pub formatted_assessment: String,
}

impl From<BarRaiserRecord> for BarRaiserView {
    fn from(record: BarRaiserRecord) -> Self {
        Self {
            assessment_class: AssessmentClass::from_assessment(&record.assessment),
            formatted_assessment: format_assessment(&record.assessment),
            record,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    /// Raw model answer, kept for debugging and re-rendering.
    pub response: String,
    pub evaluation: Option<EvaluationView>,
    pub parse_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_raiser_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_raiser: Option<BarRaiserView>,
    /// Milliseconds, after this request was recorded.
    pub average_response_time: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

fn check_length(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{field} is too long. Please limit it to {max} characters."
        )));
    }
    Ok(())
}

pub fn validate(request: &EvaluateRequest) -> Result<(), AppError> {
    if request.story.trim().is_empty() {
        return Err(AppError::Validation("story cannot be empty".to_string()));
    }
    check_length("story", &request.story, MAX_STORY_CHARS)?;
    if let Some(question) = &request.question {
        check_length("question", question, MAX_QUESTION_CHARS)?;
    }
    if let Some(job_title) = &request.job_title {
        check_length("jobTitle", job_title, MAX_JOB_TITLE_CHARS)?;
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs one evaluation end to end.
///
/// Steps:
/// 1. validate the request
/// 2. build the standard prompt (and the bar-raiser prompt if requested)
/// 3. provider.complete() for each, concurrently
/// 4. record elapsed wall time
/// 5. normalize_evaluation() → view, or a parse error message
/// 6. normalize_bar_raiser() → view
pub async fn evaluate_story(
    provider: &dyn EvaluationProvider,
    timings: &dyn ResponseTimeStore,
    request: EvaluateRequest,
) -> Result<EvaluateResponse, AppError> {
    validate(&request)?;

    let request_id = Uuid::new_v4();
    let span = info_span!("evaluation", %request_id, provider = provider.name());

    async move {
        let context = StoryContext {
            question: request.question.as_deref(),
            job_title: request.job_title.as_deref(),
        };
        let prompt = build_evaluation_prompt(&request.story, &context);
        info!(
            "Evaluating story ({} chars, bar raiser: {})",
            request.story.chars().count(),
            request.include_bar_raiser
        );

        let started = Instant::now();
        let (response, bar_raiser_response) = if request.include_bar_raiser {
            let bar_raiser_prompt =
                build_bar_raiser_prompt(&request.story, request.question.as_deref());
            let (standard, review) = tokio::try_join!(
                provider.complete(&prompt),
                provider.complete(&bar_raiser_prompt)
            )?;
            (standard, Some(review))
        } else {
            (provider.complete(&prompt).await?, None)
        };
        let elapsed = started.elapsed();

        timings.record(elapsed).await;
        let average = timings.average().await;
        info!("Provider answered in {}ms", elapsed.as_millis());

        let (evaluation, parse_error) = match normalize_evaluation(&response) {
            Ok(record) => (Some(EvaluationView::from(record)), None),
            Err(e) => {
                warn!("Returning parse failure to client: {e}");
                (None, Some(PARSE_FAILURE_MESSAGE.to_string()))
            }
        };

        let bar_raiser = bar_raiser_response
            .as_deref()
            .map(|text| BarRaiserView::from(normalize_bar_raiser(Some(text))));

        Ok::<_, AppError>(EvaluateResponse {
            response,
            evaluation,
            parse_error,
            bar_raiser_response,
            bar_raiser,
            average_response_time: u64::try_from(average.as_millis()).unwrap_or(u64::MAX),
        })
    }
    .instrument(span)
    .await
}

//! Response normalizer: turns a model's free-text answer into an [`EvaluationRecord`].
//!
//! Strategies run strict-then-lenient and the first success wins:
//! 1. fenced ```json block
//! 2. the whole text as JSON
//! 3. first `{` through last `}` as JSON
//! 4. text-pattern extraction
//!
//! JSON candidates are checked against the evaluation schema. A schema
//! violation falls through to the next strategy exactly like a syntax error.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::evaluation::models::{
    null_as_default, Category, CategoryName, EvaluationRecord, LeadershipPrinciple, OverallBand,
    TalkingPoints, MAX_CATEGORY_SCORE,
};
use crate::evaluation::text_patterns;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*(\{[\s\S]*?\})\s*```").expect("Failed to create FENCED_JSON")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no parse strategy produced an evaluation")]
    Unparseable,
}

/// One step of the parse cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    FencedJson,
    WholeJson,
    EmbeddedJson,
    TextPatterns,
}

impl Strategy {
    pub const CASCADE: [Strategy; 4] = [
        Strategy::FencedJson,
        Strategy::WholeJson,
        Strategy::EmbeddedJson,
        Strategy::TextPatterns,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::FencedJson => "fenced_json",
            Strategy::WholeJson => "whole_json",
            Strategy::EmbeddedJson => "embedded_json",
            Strategy::TextPatterns => "text_patterns",
        }
    }

    /// Runs this strategy alone. The result is not yet finalized.
    pub fn parse(&self, text: &str) -> Option<EvaluationRecord> {
        match self {
            Strategy::FencedJson => FENCED_JSON
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| parse_payload(m.as_str())),
            Strategy::WholeJson => parse_payload(text.trim()),
            Strategy::EmbeddedJson => {
                let start = text.find('{')?;
                let end = text.rfind('}')?;
                if end <= start {
                    return None;
                }
                parse_payload(&text[start..=end])
            }
            Strategy::TextPatterns => text_patterns::extract(text),
        }
    }
}

/// Normalizes one raw model answer.
///
/// Returns [`NormalizeError::Unparseable`] only when every strategy fails;
/// a partially recovered record is still `Ok`.
pub fn normalize_evaluation(text: &str) -> Result<EvaluationRecord, NormalizeError> {
    for strategy in Strategy::CASCADE {
        if let Some(record) = strategy.parse(text) {
            debug!("Evaluation parsed with strategy {}", strategy.name());
            if strategy == Strategy::TextPatterns {
                if let Some(stated) = text_patterns::stated_total(text) {
                    let computed = record.category_sum();
                    if stated != computed {
                        warn!("Model stated total {stated}/21, categories sum to {computed}");
                    }
                }
            }
            if record.talking_points.is_empty() {
                debug!("Evaluation carries no talking points");
            }
            return Ok(finalize(record));
        }
    }

    warn!(
        "Could not parse evaluation response ({} chars)",
        text.chars().count()
    );
    debug!("Unparseable evaluation response: {text}");
    Err(NormalizeError::Unparseable)
}

/// Applies the score invariants.
///
/// `total_score` is always recomputed from the categories. When categories
/// exist, a missing label or one of the five band labels is re-derived from
/// the recomputed total. A free-text label from a JSON answer is kept; the
/// text path never carries one.
pub fn finalize(mut record: EvaluationRecord) -> EvaluationRecord {
    record.total_score = record.category_sum();

    if record.categories.is_empty() {
        return record;
    }

    let label = record.overall_evaluation.trim();
    if label.is_empty() || OverallBand::from_label(label).is_some() {
        record.overall_evaluation = OverallBand::from_total(record.total_score)
            .label()
            .to_string();
    }
    record
}

// ────────────────────────────────────────────────────────────────────────────
// JSON schema
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationPayload {
    #[serde(default)]
    total_score: Option<serde_json::Value>,
    #[serde(default)]
    overall_evaluation: Option<String>,
    #[serde(default)]
    implied_question: Option<String>,
    categories: Vec<CategoryPayload>,
    #[serde(default, deserialize_with = "null_as_default")]
    leadership_principles: Vec<LeadershipPrinciple>,
    #[serde(default, deserialize_with = "null_as_default")]
    improvement_suggestions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    talking_points: TalkingPoints,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    name: CategoryName,
    score: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
}

fn parse_payload(candidate: &str) -> Option<EvaluationRecord> {
    let payload: EvaluationPayload = match serde_json::from_str(candidate) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("JSON candidate rejected: {e}");
            return None;
        }
    };

    let mut categories = Vec::with_capacity(payload.categories.len());
    for category in payload.categories {
        if category.score > MAX_CATEGORY_SCORE {
            debug!(
                "JSON candidate rejected: {} scored {}/{}",
                category.name, category.score, MAX_CATEGORY_SCORE
            );
            return None;
        }
        if categories.iter().any(|c: &Category| c.name == category.name) {
            debug!("Ignoring repeated category {}", category.name);
            continue;
        }
        categories.push(Category {
            name: category.name,
            score: category.score,
            description: category.description.trim().to_string(),
        });
    }

    let record = EvaluationRecord {
        total_score: 0,
        overall_evaluation: payload
            .overall_evaluation
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        implied_question: payload
            .implied_question
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        categories,
        leadership_principles: payload.leadership_principles,
        improvement_suggestions: payload.improvement_suggestions,
        talking_points: payload.talking_points,
    };

    if let Some(stated) = payload.total_score.as_ref().and_then(|v| v.as_u64()) {
        let computed = u64::from(record.category_sum());
        if !record.categories.is_empty() && stated != computed {
            warn!("Model stated totalScore {stated}, categories sum to {computed}");
        }
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::models::PrincipleLevel;

    fn categories_json(scores: &[u8]) -> String {
        let items: Vec<String> = CategoryName::ALL
            .iter()
            .zip(scores)
            .map(|(name, score)| {
                format!(
                    r#"{{"name": "{}", "score": {}, "description": "ok"}}"#,
                    name, score
                )
            })
            .collect();
        format!("[{}]", items.join(","))
    }

    #[test]
    fn test_total_recomputed_from_categories_even_when_stated() {
        let json = format!(
            r#"{{"totalScore": 21, "overallEvaluation": "Strong story", "categories": {}}}"#,
            categories_json(&[2, 2, 1, 3, 2, 1, 2])
        );
        let record = normalize_evaluation(&json).unwrap();
        assert_eq!(record.total_score, 13);
        assert_eq!(record.total_score, record.category_sum());
        assert_eq!(record.overall_evaluation, "Strong story");
    }

    #[test]
    fn test_fenced_json_without_label_derives_good_response() {
        let text = format!(
            "Here is my evaluation:\n```json\n{{\"categories\": {}}}\n```\nThanks!",
            categories_json(&[3, 2, 2, 2, 2, 2, 2])
        );
        assert_eq!(
            Strategy::FencedJson.parse(&text).map(|r| r.category_sum()),
            Some(15)
        );
        let record = normalize_evaluation(&text).unwrap();
        assert_eq!(record.total_score, 15);
        assert_eq!(record.overall_evaluation, "Good response");
    }

    #[test]
    fn test_band_label_rederived_from_corrected_total() {
        let json = format!(
            r#"{{"totalScore": 19, "overallEvaluation": "Excellent response", "categories": {}}}"#,
            categories_json(&[1, 1, 1, 1, 1, 1, 1])
        );
        let record = normalize_evaluation(&json).unwrap();
        assert_eq!(record.total_score, 7);
        assert_eq!(record.overall_evaluation, "Needs improvement");
    }

    #[test]
    fn test_fenced_block_without_json_tag() {
        let text = "```\n{\"categories\": [{\"name\": \"Structure\", \"score\": 3, \"description\": \"tight\"}]}\n```";
        let record = Strategy::FencedJson.parse(text).unwrap();
        assert_eq!(record.categories[0].name, CategoryName::Structure);
    }

    #[test]
    fn test_embedded_json_with_surrounding_prose() {
        let text = "Sure! {\"categories\": [{\"name\": \"Communication\", \"score\": 1, \"description\": \"rambling\"}]} Hope this helps.";
        assert!(Strategy::FencedJson.parse(text).is_none());
        assert!(Strategy::WholeJson.parse(text).is_none());
        let record = normalize_evaluation(text).unwrap();
        assert_eq!(record.total_score, 1);
        assert_eq!(record.overall_evaluation, "Poor response");
    }

    #[test]
    fn test_schema_violation_falls_through_to_text_patterns() {
        let text = "{\"categories\": [{\"name\": \"Structure\", \"score\": 7}]}\nStructure (2/3): clear arc";
        let record = normalize_evaluation(text).unwrap();
        assert_eq!(record.categories.len(), 1);
        assert_eq!(record.categories[0].score, 2);
        assert_eq!(record.categories[0].description, "clear arc");
    }

    #[test]
    fn test_missing_categories_is_schema_violation() {
        assert!(Strategy::WholeJson
            .parse(r#"{"totalScore": 12, "overallEvaluation": "Satisfactory response"}"#)
            .is_none());
    }

    #[test]
    fn test_empty_categories_keep_sentinel_label() {
        let record = normalize_evaluation(r#"{"categories": []}"#).unwrap();
        assert_eq!(record.total_score, 0);
        assert_eq!(record.overall_evaluation, "");
    }

    #[test]
    fn test_full_payload_fields_survive() {
        let json = r#"{
            "totalScore": 4,
            "overallEvaluation": "",
            "impliedQuestion": "Tell me about a time you disagreed with your manager.",
            "categories": [
                {"name": "Action Focus", "score": 3, "description": "clear steps"},
                {"name": "Results/Impact", "score": 1, "description": "no numbers"}
            ],
            "leadershipPrinciples": [
                {"name": "Have Backbone; Disagree and Commit", "level": "High", "description": "pushed back"}
            ],
            "improvementSuggestions": ["Quantify the outcome"],
            "talkingPoints": {"Situation": ["legacy billing"], "Task": [], "Action": ["wrote RFC"], "Result": ["adopted"]}
        }"#;
        let record = normalize_evaluation(json).unwrap();
        assert_eq!(
            record.implied_question.as_deref(),
            Some("Tell me about a time you disagreed with your manager.")
        );
        assert_eq!(record.total_score, 4);
        assert_eq!(record.overall_evaluation, "Poor response");
        assert_eq!(record.leadership_principles[0].level, PrincipleLevel::High);
        assert_eq!(record.improvement_suggestions, vec!["Quantify the outcome"]);
        assert_eq!(record.talking_points.action, vec!["wrote RFC"]);
        assert!(record.talking_points.task.is_empty());
    }

    #[test]
    fn test_repeated_json_category_counts_once() {
        let json = r#"{"categories": [
            {"name": "Structure", "score": 3, "description": "first"},
            {"name": "structure", "score": 3, "description": "echo"}
        ]}"#;
        let record = normalize_evaluation(json).unwrap();
        assert_eq!(record.categories.len(), 1);
        assert_eq!(record.categories[0].description, "first");
        assert_eq!(record.total_score, 3);
    }

    #[test]
    fn test_null_list_fields_read_as_empty() {
        let json = r#"{
            "totalScore": 5,
            "overallEvaluation": null,
            "categories": [
                {"name": "Structure", "score": 2, "description": null},
                {"name": "Communication", "score": 3, "description": "concise"}
            ],
            "leadershipPrinciples": [{"name": "Ownership", "level": null, "description": null}],
            "improvementSuggestions": null,
            "talkingPoints": null
        }"#;
        assert!(Strategy::WholeJson.parse(json).is_some());
        let record = normalize_evaluation(json).unwrap();
        assert_eq!(record.total_score, 5);
        assert_eq!(record.overall_evaluation, "Poor response");
        assert_eq!(record.categories[0].description, "");
        assert_eq!(record.leadership_principles[0].name, "Ownership");
        assert!(record.improvement_suggestions.is_empty());
        assert!(record.talking_points.is_empty());
    }

    #[test]
    fn test_null_talking_point_keys_read_as_empty() {
        let json = r#"{"categories": [{"name": "Specificity", "score": 1, "description": "vague"}],
            "talkingPoints": {"Situation": ["outage"], "Task": null, "Action": null, "Result": ["fixed"]}}"#;
        let record = normalize_evaluation(json).unwrap();
        assert_eq!(record.talking_points.situation, vec!["outage"]);
        assert!(record.talking_points.task.is_empty());
        assert_eq!(record.talking_points.result, vec!["fixed"]);
    }

    #[test]
    fn test_renormalizing_serialized_record_is_idempotent() {
        let json = format!(
            r#"{{"totalScore": 3, "impliedQuestion": "Why?", "categories": {}, "leadershipPrinciples": [{{"name": "Ownership", "level": "Moderate-High", "description": "stayed late"}}], "improvementSuggestions": ["more data"]}}"#,
            categories_json(&[3, 3, 3, 2, 3, 3, 3])
        );
        let first = normalize_evaluation(&json).unwrap();
        let reserialized = serde_json::to_string(&first).unwrap();
        let second = normalize_evaluation(&reserialized).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.overall_evaluation, "Excellent response");
    }

    #[test]
    fn test_unparseable_text_is_an_error() {
        assert_eq!(
            normalize_evaluation("I'm sorry, I can't evaluate this story."),
            Err(NormalizeError::Unparseable)
        );
        assert_eq!(normalize_evaluation(""), Err(NormalizeError::Unparseable));
    }

    #[test]
    fn test_strategy_cascade_order() {
        let names: Vec<_> = Strategy::CASCADE.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["fenced_json", "whole_json", "embedded_json", "text_patterns"]
        );
    }
}

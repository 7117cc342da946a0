//! Normalized evaluation records handed to the display layer.
//!
//! Field names serialize in camelCase so a serialized record has the same
//! shape the evaluation prompt asks the model to return. Re-normalizing a
//! serialized record therefore yields the same record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Maximum points per rubric category.
pub const MAX_CATEGORY_SCORE: u8 = 3;

pub const NOT_PROVIDED: &str = "Not provided";
pub const NOT_AVAILABLE: &str = "Not available";
pub const PARSE_ERROR_SENTINEL: &str = "Error parsing response";

/// Reads an explicit JSON `null` the same way as a missing key.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ────────────────────────────────────────────────────────────────────────────
// Rubric categories
// ────────────────────────────────────────────────────────────────────────────

/// The seven fixed rubric categories, in rubric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryName {
    Structure,
    RelevanceToQuestion,
    Specificity,
    ActionFocus,
    ResultsImpact,
    LeadershipAlignment,
    Communication,
}

impl CategoryName {
    pub const ALL: [CategoryName; 7] = [
        CategoryName::Structure,
        CategoryName::RelevanceToQuestion,
        CategoryName::Specificity,
        CategoryName::ActionFocus,
        CategoryName::ResultsImpact,
        CategoryName::LeadershipAlignment,
        CategoryName::Communication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryName::Structure => "Structure",
            CategoryName::RelevanceToQuestion => "Relevance to Question",
            CategoryName::Specificity => "Specificity",
            CategoryName::ActionFocus => "Action Focus",
            CategoryName::ResultsImpact => "Results/Impact",
            CategoryName::LeadershipAlignment => "Alignment with Amazon Leadership Principles",
            CategoryName::Communication => "Communication",
        }
    }
}

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown rubric category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

/// Lowercase alphanumerics only, so "Results / Impact" and "results-impact" compare equal.
fn category_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for CategoryName {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = category_key(value);
        if let Some(name) = CategoryName::ALL
            .iter()
            .find(|name| category_key(name.as_str()) == key)
        {
            return Ok(*name);
        }

        match key.as_str() {
            "relevance" => Ok(CategoryName::RelevanceToQuestion),
            "results" | "impact" => Ok(CategoryName::ResultsImpact),
            "alignmentwithleadershipprinciples" | "leadershipprinciples" => {
                Ok(CategoryName::LeadershipAlignment)
            }
            _ => Err(UnknownCategory(value.trim().to_string())),
        }
    }
}

impl Serialize for CategoryName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CategoryName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One scored rubric category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: CategoryName,
    /// 0..=3
    pub score: u8,
    pub description: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Overall bands
// ────────────────────────────────────────────────────────────────────────────

/// Fixed score bands used to label a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallBand {
    Excellent,
    Good,
    Satisfactory,
    NeedsImprovement,
    Poor,
}

impl OverallBand {
    pub const ALL: [OverallBand; 5] = [
        OverallBand::Excellent,
        OverallBand::Good,
        OverallBand::Satisfactory,
        OverallBand::NeedsImprovement,
        OverallBand::Poor,
    ];

    /// [18,21] Excellent, [14,17] Good, [10,13] Satisfactory, [6,9] Needs improvement, [0,5] Poor.
    pub fn from_total(total: u32) -> Self {
        match total {
            18.. => OverallBand::Excellent,
            14..=17 => OverallBand::Good,
            10..=13 => OverallBand::Satisfactory,
            6..=9 => OverallBand::NeedsImprovement,
            _ => OverallBand::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OverallBand::Excellent => "Excellent response",
            OverallBand::Good => "Good response",
            OverallBand::Satisfactory => "Satisfactory response",
            OverallBand::NeedsImprovement => "Needs improvement",
            OverallBand::Poor => "Poor response",
        }
    }

    /// Matches a label produced by [`OverallBand::label`], ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        OverallBand::ALL
            .into_iter()
            .find(|band| band.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for OverallBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Leadership principles
// ────────────────────────────────────────────────────────────────────────────

/// How strongly a principle shows in the story. Free text survives as `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipleLevel {
    High,
    Moderate,
    Low,
    Other(String),
}

impl PrincipleLevel {
    pub fn as_str(&self) -> &str {
        match self {
            PrincipleLevel::High => "High",
            PrincipleLevel::Moderate => "Moderate",
            PrincipleLevel::Low => "Low",
            PrincipleLevel::Other(text) => text,
        }
    }
}

impl From<&str> for PrincipleLevel {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "high" => PrincipleLevel::High,
            "moderate" | "medium" => PrincipleLevel::Moderate,
            "low" => PrincipleLevel::Low,
            _ => PrincipleLevel::Other(trimmed.to_string()),
        }
    }
}

impl Serialize for PrincipleLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PrincipleLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(PrincipleLevel::from(raw.as_str()))
    }
}

impl Default for PrincipleLevel {
    fn default() -> Self {
        PrincipleLevel::Other(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadershipPrinciple {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: PrincipleLevel,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// The 14 principle names the evaluation prompt lists.
pub const LEADERSHIP_PRINCIPLES: [&str; 14] = [
    "Customer Obsession",
    "Ownership",
    "Invent and Simplify",
    "Are Right, A Lot",
    "Learn and Be Curious",
    "Hire and Develop the Best",
    "Insist on the Highest Standards",
    "Think Big",
    "Bias for Action",
    "Frugality",
    "Earn Trust",
    "Dive Deep",
    "Have Backbone; Disagree and Commit",
    "Deliver Results",
];

// ────────────────────────────────────────────────────────────────────────────
// Talking points
// ────────────────────────────────────────────────────────────────────────────

/// STAR talking points. Always serializes all four keys in S-T-A-R order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TalkingPoints {
    #[serde(rename = "Situation", default, deserialize_with = "null_as_default")]
    pub situation: Vec<String>,
    #[serde(rename = "Task", default, deserialize_with = "null_as_default")]
    pub task: Vec<String>,
    #[serde(rename = "Action", default, deserialize_with = "null_as_default")]
    pub action: Vec<String>,
    #[serde(rename = "Result", default, deserialize_with = "null_as_default")]
    pub result: Vec<String>,
}

impl TalkingPoints {
    pub fn is_empty(&self) -> bool {
        self.situation.is_empty()
            && self.task.is_empty()
            && self.action.is_empty()
            && self.result.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Records
// ────────────────────────────────────────────────────────────────────────────

/// Canonical result of a standard evaluation.
///
/// After normalization `total_score` always equals the sum of category scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRecord {
    pub total_score: u32,
    pub overall_evaluation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_question: Option<String>,
    pub categories: Vec<Category>,
    pub leadership_principles: Vec<LeadershipPrinciple>,
    pub improvement_suggestions: Vec<String>,
    pub talking_points: TalkingPoints,
}

impl EvaluationRecord {
    pub fn category_sum(&self) -> u32 {
        self.categories.iter().map(|c| u32::from(c.score)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarRaiserPrinciple {
    pub name: String,
    pub analysis: String,
}

/// Result of the optional bar-raiser review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarRaiserRecord {
    pub assessment: String,
    pub leadership_principles: Vec<BarRaiserPrinciple>,
    pub scope_analysis: String,
    pub decision_quality: String,
    pub red_flags: Vec<String>,
    pub cross_level_assessment: String,
    pub follow_up_questions: Vec<String>,
    pub comparison_to_bar: String,
}

impl Default for BarRaiserRecord {
    fn default() -> Self {
        Self {
            assessment: NOT_PROVIDED.to_string(),
            leadership_principles: vec![],
            scope_analysis: NOT_PROVIDED.to_string(),
            decision_quality: NOT_PROVIDED.to_string(),
            red_flags: vec![],
            cross_level_assessment: NOT_PROVIDED.to_string(),
            follow_up_questions: vec![],
            comparison_to_bar: NOT_PROVIDED.to_string(),
        }
    }
}

impl BarRaiserRecord {
    /// Record returned when the review text could not be processed at all.
    pub fn parse_failure() -> Self {
        Self {
            assessment: PARSE_ERROR_SENTINEL.to_string(),
            leadership_principles: vec![],
            scope_analysis: NOT_AVAILABLE.to_string(),
            decision_quality: NOT_AVAILABLE.to_string(),
            red_flags: vec![PARSE_ERROR_SENTINEL.to_string()],
            cross_level_assessment: NOT_AVAILABLE.to_string(),
            follow_up_questions: vec![],
            comparison_to_bar: NOT_AVAILABLE.to_string(),
        }
    }
}

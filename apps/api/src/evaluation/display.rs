//! Display helpers derived from a bar-raiser assessment.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

static RECOMMENDATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Strong No Hire|Strong Hire|Not Inclined|Inclined)(\s*[-:]\s*|\s+)")
        .expect("Failed to create RECOMMENDATION")
});

/// Hiring recommendation bucket used to style the assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentClass {
    StrongHire,
    Inclined,
    NotInclined,
    StrongNoHire,
    Neutral,
}

impl AssessmentClass {
    /// Case-insensitive substring match. "inclined" only counts when
    /// "not inclined" is absent.
    pub fn from_assessment(assessment: &str) -> Self {
        let lower = assessment.to_lowercase();
        let not_inclined = lower.contains("not inclined");

        if lower.contains("strong hire") {
            AssessmentClass::StrongHire
        } else if lower.contains("inclined") && !not_inclined {
            AssessmentClass::Inclined
        } else if not_inclined {
            AssessmentClass::NotInclined
        } else if lower.contains("strong no hire") {
            AssessmentClass::StrongNoHire
        } else {
            AssessmentClass::Neutral
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            AssessmentClass::StrongHire => "assessment-strong-hire",
            AssessmentClass::Inclined => "assessment-inclined",
            AssessmentClass::NotInclined => "assessment-not-inclined",
            AssessmentClass::StrongNoHire => "assessment-strong-no-hire",
            AssessmentClass::Neutral => "assessment-neutral",
        }
    }
}

impl Serialize for AssessmentClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.css_class())
    }
}

/// Puts a paragraph break right after the first recommendation phrase.
/// Text without a recommendation phrase passes through unchanged.
pub fn format_assessment(assessment: &str) -> String {
    RECOMMENDATION
        .replacen(assessment, 1, "${1}\n\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_inclined_wins_over_inclined() {
        let class = AssessmentClass::from_assessment("Not Inclined due to scope concerns.");
        assert_eq!(class, AssessmentClass::NotInclined);
        assert_eq!(class.css_class(), "assessment-not-inclined");
    }

    #[test]
    fn test_assessment_classes() {
        assert_eq!(
            AssessmentClass::from_assessment("STRONG HIRE - exceptional"),
            AssessmentClass::StrongHire
        );
        assert_eq!(
            AssessmentClass::from_assessment("Inclined, with reservations"),
            AssessmentClass::Inclined
        );
        assert_eq!(
            AssessmentClass::from_assessment("Strong No Hire"),
            AssessmentClass::StrongNoHire
        );
        assert_eq!(
            AssessmentClass::from_assessment("Not provided"),
            AssessmentClass::Neutral
        );
    }

    #[test]
    fn test_css_class_serializes_as_string() {
        let json = serde_json::to_string(&AssessmentClass::Inclined).unwrap();
        assert_eq!(json, r#""assessment-inclined""#);
    }

    #[test]
    fn test_format_inserts_break_after_recommendation() {
        assert_eq!(
            format_assessment("Inclined - the candidate owns the outcome"),
            "Inclined\n\nthe candidate owns the outcome"
        );
        assert_eq!(
            format_assessment("Not Inclined: scope too small"),
            "Not Inclined\n\nscope too small"
        );
        assert_eq!(
            format_assessment("Strong No Hire because of integrity concerns"),
            "Strong No Hire\n\nbecause of integrity concerns"
        );
    }

    #[test]
    fn test_format_passes_through_without_recommendation() {
        assert_eq!(format_assessment("Not provided"), "Not provided");
        assert_eq!(format_assessment("Strong Hire"), "Strong Hire");
    }
}

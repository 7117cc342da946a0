//! Bar-raiser review parser.
//!
//! The bar-raiser prompt asks for prose under numbered headings, so there is
//! no JSON strategy here. Each field is the text between its own heading and
//! the next recognized heading. Parsing never fails outward: problems degrade
//! to a sentinel-filled record.

use std::panic;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::evaluation::models::{BarRaiserPrinciple, BarRaiserRecord, NOT_PROVIDED};

/// Sections of a bar-raiser review, in the order the prompt requests them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    BarRaiserAssessment,
    OverallAssessment,
    PrinciplesDeepDive,
    ScopeAndImpact,
    DecisionQuality,
    RedFlags,
    CrossLevel,
    Questions,
    ComparisonToBar,
}

impl Section {
    pub const ALL: [Section; 9] = [
        Section::BarRaiserAssessment,
        Section::OverallAssessment,
        Section::PrinciplesDeepDive,
        Section::ScopeAndImpact,
        Section::DecisionQuality,
        Section::RedFlags,
        Section::CrossLevel,
        Section::Questions,
        Section::ComparisonToBar,
    ];

    pub fn heading(&self) -> &'static str {
        match self {
            Section::BarRaiserAssessment => "Bar Raiser Overall Assessment",
            Section::OverallAssessment => "Overall Assessment",
            Section::PrinciplesDeepDive => "Leadership Principles Deep Dive",
            Section::ScopeAndImpact => "Scope and Impact Analysis",
            Section::DecisionQuality => "Decision Quality",
            Section::RedFlags => "Red Flags and Concerns",
            Section::CrossLevel => "Cross-Level Assessment",
            Section::Questions => "Bar Raiser Questions",
            Section::ComparisonToBar => "Comparison to Bar",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BarRaiserParseError {
    #[error("review is {len} chars, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("parser panicked: {0}")]
    Panicked(String),
}

/// Far above what a 4096-token completion can produce.
pub const MAX_REVIEW_CHARS: usize = 50_000;

struct HeadingPattern {
    section: Section,
    regex: Regex,
}

/// A heading counts only at the start of a line, after optional markdown
/// decoration (`##`, `**`, `>`) and an optional `3.` enumerator, and only
/// when a colon or the end of the line follows it.
static HEADINGS: LazyLock<Vec<HeadingPattern>> = LazyLock::new(|| {
    Section::ALL
        .iter()
        .map(|section| {
            let pattern = format!(
                r"(?im)^[ \t#>*]*(?:\d+[.)][ \t]*)?[ \t*]*{}[ \t*]*(?::|\r?$)",
                regex::escape(section.heading())
            );
            HeadingPattern {
                section: *section,
                regex: Regex::new(&pattern).expect("Failed to create heading pattern"),
            }
        })
        .collect()
});

static PRINCIPLE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:[-*•][ \t]+|\d+[.)][ \t]*)?(?:\*\*)?([A-Za-z][A-Za-z,; ]*?)[ \t]*(?:\((?:Strong|Demonstrated)\))?[ \t]*(?:\*\*)?[ \t]*:[ \t]*(?:\*\*[ \t]*)?(.*)$",
    )
    .expect("Failed to create PRINCIPLE_ENTRY")
});

static RED_FLAG_BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*[-*•][ \t]+([^\n]*\.)[ \t]*$").expect("Failed to create RED_FLAG_BULLET")
});

static QUESTION_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[-*•]|\d+[.)])[ \t]+([^\n]*\?)[ \t*]*$")
        .expect("Failed to create QUESTION_ITEM")
});

/// Longest principle name in the catalogue has five words.
const MAX_PRINCIPLE_NAME_WORDS: usize = 6;

/// Parses an optional bar-raiser review. Absent or blank input is a valid,
/// all-default record; internal failures yield [`BarRaiserRecord::parse_failure`].
pub fn normalize_bar_raiser(text: Option<&str>) -> BarRaiserRecord {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return BarRaiserRecord::default();
    };

    match guarded(text, parse_sections) {
        Ok(record) => record,
        Err(e) => {
            warn!("Bar raiser response could not be parsed: {e}");
            debug!("Raw bar raiser response: {text}");
            BarRaiserRecord::parse_failure()
        }
    }
}

/// Runs `parse` with a size check, turning a panic into an error.
fn guarded(
    text: &str,
    parse: fn(&str) -> Result<BarRaiserRecord, BarRaiserParseError>,
) -> Result<BarRaiserRecord, BarRaiserParseError> {
    let len = text.chars().count();
    if len > MAX_REVIEW_CHARS {
        return Err(BarRaiserParseError::TooLong {
            len,
            max: MAX_REVIEW_CHARS,
        });
    }

    panic::catch_unwind(|| parse(text)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(BarRaiserParseError::Panicked(message))
    })
}

fn parse_sections(text: &str) -> Result<BarRaiserRecord, BarRaiserParseError> {
    let sections = SectionMap::locate(text, &HEADINGS);
    let mut record = BarRaiserRecord::default();

    let assessment = sections
        .body(Section::BarRaiserAssessment)
        .or_else(|| sections.body(Section::OverallAssessment))
        .map(first_fragment)
        .filter(|a| !a.is_empty());
    if let Some(assessment) = assessment {
        record.assessment = assessment;
    }

    if let Some(body) = sections.body(Section::PrinciplesDeepDive) {
        record.leadership_principles = parse_principles(body);
    }

    record.scope_analysis = sections.text_or_default(Section::ScopeAndImpact);
    record.decision_quality = sections.text_or_default(Section::DecisionQuality);
    record.cross_level_assessment = sections.text_or_default(Section::CrossLevel);
    record.comparison_to_bar = sections.text_or_default(Section::ComparisonToBar);

    if let Some(body) = sections.body(Section::RedFlags) {
        record.red_flags = parse_red_flags(body);
    }

    if let Some(body) = sections.body(Section::Questions) {
        record.follow_up_questions = QUESTION_ITEM
            .captures_iter(body)
            .map(|caps| caps[1].replace("**", "").trim().to_string())
            .collect();
    }

    Ok(record)
}

/// Heading positions found in one review.
struct SectionMap<'a> {
    text: &'a str,
    /// (section, heading start, body start), sorted by heading start.
    found: Vec<(Section, usize, usize)>,
}

impl<'a> SectionMap<'a> {
    fn locate(text: &'a str, headings: &[HeadingPattern]) -> Self {
        let mut found: Vec<(Section, usize, usize)> = headings
            .iter()
            .filter_map(|h| h.regex.find(text).map(|m| (h.section, m.start(), m.end())))
            .collect();
        found.sort_by_key(|(_, start, _)| *start);
        Self { text, found }
    }

    /// Text strictly between the section's heading and the next heading.
    fn body(&self, section: Section) -> Option<&'a str> {
        let (_, _, body_start) = self.found.iter().find(|(s, _, _)| *s == section)?;
        let body_end = self
            .found
            .iter()
            .map(|(_, start, _)| *start)
            .filter(|start| *start >= *body_start)
            .min()
            .unwrap_or(self.text.len());
        Some(clean_body(&self.text[*body_start..body_end]))
    }

    fn text_or_default(&self, section: Section) -> String {
        self.body(section)
            .filter(|body| !body.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| NOT_PROVIDED.to_string())
    }
}

/// Drops the `**:` left after a bold heading and trailing horizontal rules.
fn clean_body(raw: &str) -> &str {
    let mut body = raw.trim_start_matches(|c: char| c == '*' || c == ':' || c.is_whitespace());
    loop {
        body = body.trim_end();
        let last_line_start = body.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let last_line = body[last_line_start..].trim();
        let is_rule = !last_line.is_empty()
            && last_line.chars().all(|c| matches!(c, '-' | '*' | '_' | '#'));
        if !is_rule {
            return body;
        }
        body = &body[..last_line_start];
    }
}

/// Assessment is the text up to the first period.
fn first_fragment(body: &str) -> String {
    let fragment = body.split('.').next().unwrap_or_default();
    fragment.replace("**", "").trim().to_string()
}

fn parse_principles(body: &str) -> Vec<BarRaiserPrinciple> {
    let mut principles: Vec<BarRaiserPrinciple> = Vec::new();
    let mut open = false;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            if principles.last().is_some_and(|p| !p.analysis.is_empty()) {
                open = false;
            }
            continue;
        }

        let entry = PRINCIPLE_ENTRY.captures(line).filter(|caps| {
            caps[1].split_whitespace().count() <= MAX_PRINCIPLE_NAME_WORDS
        });
        if let Some(caps) = entry {
            principles.push(BarRaiserPrinciple {
                name: caps[1].trim().to_string(),
                analysis: caps[2].trim().to_string(),
            });
            open = true;
            continue;
        }

        if open {
            if let Some(last) = principles.last_mut() {
                if !last.analysis.is_empty() {
                    last.analysis.push(' ');
                }
                last.analysis.push_str(line);
            }
        }
    }

    principles
}

/// Never empty: a section without sentence bullets becomes one entry.
fn parse_red_flags(body: &str) -> Vec<String> {
    let flags: Vec<String> = RED_FLAG_BULLET
        .captures_iter(body)
        .map(|caps| caps[1].trim().to_string())
        .collect();
    if !flags.is_empty() {
        return flags;
    }
    if body.is_empty() {
        vec![NOT_PROVIDED.to_string()]
    } else {
        vec![body.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEW: &str = "\
# Bar Raiser Feedback

1. **Bar Raiser Overall Assessment**: Inclined - the candidate shows clear ownership. Scope is a concern.

2. **Leadership Principles Deep Dive**:
**Ownership (Strong)**: Took the on-call rotation without being asked.
**Dive Deep**: Traced the memory leak to a single allocator.
Gaps in Frugality: no discussion of cost.

3. **Scope and Impact Analysis**: A single-team project with moderate impact.

4. **Decision Quality**: Weighed rollback against hotfix and picked the reversible path.

5. **Red Flags and Concerns**:
- Uses \"we\" for most of the key decisions.
- Results are not quantified.

6. **Cross-Level Assessment**: Fits SDE II, light for senior.

7. **Bar Raiser Questions**:
1. What would you have done if the rollback failed?
2. How did you measure the impact?
- Who else was involved in the diagnosis?

8. **Comparison to Bar**: At the bar for the level, not raising it.

---
";

    #[test]
    fn test_parses_every_section() {
        let record = normalize_bar_raiser(Some(REVIEW));
        assert_eq!(record.assessment, "Inclined - the candidate shows clear ownership");
        assert_eq!(
            record.scope_analysis,
            "A single-team project with moderate impact."
        );
        assert_eq!(
            record.decision_quality,
            "Weighed rollback against hotfix and picked the reversible path."
        );
        assert_eq!(record.cross_level_assessment, "Fits SDE II, light for senior.");
        assert_eq!(
            record.comparison_to_bar,
            "At the bar for the level, not raising it."
        );
    }

    #[test]
    fn test_principles_drop_strength_annotation() {
        let record = normalize_bar_raiser(Some(REVIEW));
        let names: Vec<&str> = record
            .leadership_principles
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Ownership", "Dive Deep", "Gaps in Frugality"]);
        assert_eq!(
            record.leadership_principles[0].analysis,
            "Took the on-call rotation without being asked."
        );
    }

    #[test]
    fn test_red_flag_bullets_captured_individually() {
        let record = normalize_bar_raiser(Some(REVIEW));
        assert_eq!(
            record.red_flags,
            vec![
                "Uses \"we\" for most of the key decisions.",
                "Results are not quantified."
            ]
        );
    }

    #[test]
    fn test_red_flags_prose_becomes_single_entry() {
        let text = "Red Flags and Concerns: The candidate never explains their own role\nand the timeline is unclear\n\nCross-Level Assessment: Appropriate for L5.";
        let record = normalize_bar_raiser(Some(text));
        assert_eq!(record.red_flags.len(), 1);
        assert_eq!(
            record.red_flags[0],
            "The candidate never explains their own role\nand the timeline is unclear"
        );
        assert_eq!(record.cross_level_assessment, "Appropriate for L5.");
    }

    #[test]
    fn test_follow_up_questions_numbered_and_bulleted() {
        let record = normalize_bar_raiser(Some(REVIEW));
        assert_eq!(
            record.follow_up_questions,
            vec![
                "What would you have done if the rollback failed?",
                "How did you measure the impact?",
                "Who else was involved in the diagnosis?"
            ]
        );
    }

    #[test]
    fn test_missing_sections_keep_not_provided() {
        let record = normalize_bar_raiser(Some("Overall Assessment: Strong Hire. Great story."));
        assert_eq!(record.assessment, "Strong Hire");
        assert_eq!(record.scope_analysis, NOT_PROVIDED);
        assert_eq!(record.decision_quality, NOT_PROVIDED);
        assert!(record.red_flags.is_empty());
        assert!(record.leadership_principles.is_empty());
    }

    #[test]
    fn test_heading_mentioned_mid_sentence_is_not_a_heading() {
        let text = "Overall Assessment: Not Inclined. The decision quality was weak.\nDecision Quality: Rushed.";
        let record = normalize_bar_raiser(Some(text));
        assert_eq!(record.assessment, "Not Inclined");
        assert_eq!(record.decision_quality, "Rushed.");
    }

    #[test]
    fn test_absent_or_blank_input_is_default_record() {
        assert_eq!(normalize_bar_raiser(None), BarRaiserRecord::default());
        assert_eq!(normalize_bar_raiser(Some("  \n")), BarRaiserRecord::default());
    }

    #[test]
    fn test_prose_starting_with_heading_words_does_not_split() {
        let text = "\
3. **Scope and Impact Analysis**: Team-level project.
Decision quality aside, the scope is small for L6.

4. **Decision Quality**: Picked the reversible path after weighing rollback.

5. **Red Flags and Concerns**:
* Cross-level assessment is unclear from the story.
* No metrics for the outcome.

6. **Cross-Level Assessment**: Solid L5.";
        let record = normalize_bar_raiser(Some(text));
        assert_eq!(
            record.scope_analysis,
            "Team-level project.\nDecision quality aside, the scope is small for L6."
        );
        assert_eq!(
            record.decision_quality,
            "Picked the reversible path after weighing rollback."
        );
        assert_eq!(
            record.red_flags,
            vec![
                "Cross-level assessment is unclear from the story.",
                "No metrics for the outcome."
            ]
        );
        assert_eq!(record.cross_level_assessment, "Solid L5.");
    }

    #[test]
    fn test_oversized_review_yields_error_record() {
        let text = format!("Overall Assessment: Inclined.\n{}", "x".repeat(MAX_REVIEW_CHARS));
        let record = normalize_bar_raiser(Some(&text));
        assert_eq!(record, BarRaiserRecord::parse_failure());
        assert_eq!(record.assessment, "Error parsing response");
        assert_eq!(record.red_flags.len(), 1);
        assert_eq!(record.scope_analysis, "Not available");
    }

    #[test]
    fn test_parser_panic_becomes_error() {
        fn exploding(_: &str) -> Result<BarRaiserRecord, BarRaiserParseError> {
            panic!("section offsets out of order")
        }
        assert_eq!(
            guarded("Overall Assessment: Inclined.", exploding),
            Err(BarRaiserParseError::Panicked(
                "section offsets out of order".to_string()
            ))
        );
        assert!(guarded("Overall Assessment: Inclined.", parse_sections).is_ok());
    }

    #[test]
    fn test_markdown_headings_slice_sections() {
        let text = "## Scope and Impact Analysis\nOrg-wide migration.\n## Decision Quality\nSound.";
        let record = normalize_bar_raiser(Some(text));
        assert_eq!(record.scope_analysis, "Org-wide migration.");
        assert_eq!(record.decision_quality, "Sound.");
    }
}

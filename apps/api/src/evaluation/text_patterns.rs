//! Text-pattern extraction for evaluations the model wrote as prose.
//!
//! Each rule is independent and optional. The result only counts as an
//! evaluation when at least one rubric category line was recovered.

use std::sync::LazyLock;

use regex::Regex;

use crate::evaluation::models::{
    Category, CategoryName, EvaluationRecord, LeadershipPrinciple, PrincipleLevel, TalkingPoints,
    MAX_CATEGORY_SCORE,
};

static TOTAL_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Total Score:\s*(\d+)\s*/\s*21")
        .expect("Failed to create TOTAL_SCORE")
});

static CATEGORY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(Structure|Relevance to Question|Specificity|Action Focus|Results/Impact|Alignment with Amazon Leadership Principles|Communication)\s*\((\d+)/3\):[ \t]*([^\n]+)",
    )
    .expect("Failed to create CATEGORY_LINE")
});

static PRINCIPLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\d+\.[ \t]*([^(\n]+?)[ \t]*\(([^)\n]+)\):[ \t]*([^\n]+)")
        .expect("Failed to create PRINCIPLE_LINE")
});

static SCORE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*/\s*\d+$").expect("Failed to create SCORE_LIKE"));

static IMPLIED_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t#*]*Implied Question:[ \t*]*([^\n]+)")
        .expect("Failed to create IMPLIED_QUESTION")
});

static SUGGESTIONS_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Suggestions for Improvement:(.*?)(?:Bullet-Point|\z)")
        .expect("Failed to create SUGGESTIONS_SECTION")
});

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\d+\.[ \t]*([^\n]+)").expect("Failed to create NUMBERED_ITEM")
});

static TALKING_POINTS_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Bullet-Point Talking Points.*?Situation:(.*?)Task:(.*?)Action:(.*?)Result:(.*)")
        .expect("Failed to create TALKING_POINTS_SECTION")
});

static DASH_BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*-[ \t]*([^\n]+)").expect("Failed to create DASH_BULLET")
});

/// Runs every text rule. `None` when no category line was found.
pub fn extract(text: &str) -> Option<EvaluationRecord> {
    let categories = extract_categories(text);
    if categories.is_empty() {
        return None;
    }

    // A header label describes the printed total, not the category sum, so the
    // label is always derived from the recovered categories.
    Some(EvaluationRecord {
        total_score: 0,
        overall_evaluation: String::new(),
        implied_question: IMPLIED_QUESTION
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|q| !q.is_empty()),
        categories,
        leadership_principles: extract_principles(text),
        improvement_suggestions: extract_suggestions(text),
        talking_points: extract_talking_points(text),
    })
}

/// The score printed in a `Total Score: N/21 (label)` header, if any.
pub fn stated_total(text: &str) -> Option<u32> {
    TOTAL_SCORE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// First valid line per category wins; later repeats (closing summaries) are ignored.
fn extract_categories(text: &str) -> Vec<Category> {
    let mut categories: Vec<Category> = Vec::new();
    for caps in CATEGORY_LINE.captures_iter(text) {
        let Ok(name) = caps[1].parse::<CategoryName>() else {
            continue;
        };
        let Ok(score) = caps[2].parse::<u8>() else {
            continue;
        };
        if score > MAX_CATEGORY_SCORE || categories.iter().any(|c| c.name == name) {
            continue;
        }
        categories.push(Category {
            name,
            score,
            description: caps[3].trim().trim_matches('*').trim().to_string(),
        });
    }
    categories
}

fn extract_principles(text: &str) -> Vec<LeadershipPrinciple> {
    PRINCIPLE_LINE
        .captures_iter(text)
        .filter(|caps| !SCORE_LIKE.is_match(caps[2].trim()))
        .map(|caps| LeadershipPrinciple {
            name: caps[1].trim().to_string(),
            level: PrincipleLevel::from(&caps[2]),
            description: caps[3].trim().to_string(),
        })
        .collect()
}

fn extract_suggestions(text: &str) -> Vec<String> {
    let Some(section) = SUGGESTIONS_SECTION.captures(text).and_then(|c| c.get(1)) else {
        return vec![];
    };
    NUMBERED_ITEM
        .captures_iter(section.as_str())
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

fn extract_talking_points(text: &str) -> TalkingPoints {
    let Some(caps) = TALKING_POINTS_SECTION.captures(text) else {
        return TalkingPoints::default();
    };
    let bullets = |index: usize| -> Vec<String> {
        caps.get(index)
            .map(|section| {
                DASH_BULLET
                    .captures_iter(section.as_str())
                    .map(|b| b[1].trim().to_string())
                    .collect()
            })
            .unwrap_or_default()
    };
    TalkingPoints {
        situation: bullets(1),
        task: bullets(2),
        action: bullets(3),
        result: bullets(4),
    }
}

// Prompt templates for the evaluation module.
// The JSON shape in EVALUATION_PROMPT_TEMPLATE is the contract normalizer.rs validates against.

use crate::evaluation::models::{CategoryName, OverallBand, LEADERSHIP_PRINCIPLES};

/// Standard evaluation prompt. Replace: {rubric}, {bands}, {principles}, {context}, {story}
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"You are an experienced Amazon interviewer evaluating a candidate's behavioral answer against Amazon's Leadership Principles. Be critical but constructive: the goal is to help the candidate tell a stronger STAR (Situation, Task, Action, Result) story.

RUBRIC — score each category from 0 to 3:
{rubric}

The total is the sum of the seven category scores (maximum 21). Label the total with exactly one of:
{bands}

LEADERSHIP PRINCIPLES to look for:
{principles}

METHODOLOGY:
1. Read the story carefully and infer the behavioral question it answers.
2. Score each rubric category on its own.
3. Identify the leadership principles demonstrated and rate each High, Moderate, or Low.
4. Suggest concrete improvements, focused on demonstrating the principles more strongly.
5. Distill the story into short talking points, grouped by STAR element, in story order. Include enough bullets that no important story element is lost; keep each bullet short enough to serve as a hint.
{context}
<star_response>
{story}
</star_response>

IMPORTANT: totalScore MUST equal the sum of the category scores.

Respond with JSON only, in exactly this shape:
{
  "totalScore": 0,
  "overallEvaluation": "",
  "impliedQuestion": "",
  "categories": [
    {"name": "", "score": 0, "description": ""}
  ],
  "leadershipPrinciples": [
    {"name": "", "level": "", "description": ""}
  ],
  "improvementSuggestions": [],
  "talkingPoints": {
    "Situation": [],
    "Task": [],
    "Action": [],
    "Result": []
  }
}"#;

/// One line per rubric category: what a 0 and a 3 look like.
const RUBRIC_ANCHORS: [(CategoryName, &str, &str); 7] = [
    (
        CategoryName::Structure,
        "no clear STAR structure",
        "well-balanced STAR structure with appropriate time allocation",
    ),
    (
        CategoryName::RelevanceToQuestion,
        "does not address the question",
        "directly and fully addresses the question",
    ),
    (
        CategoryName::Specificity,
        "vague, general statements",
        "highly specific details throughout",
    ),
    (
        CategoryName::ActionFocus,
        "no clear actions described",
        "clear, detailed explanation of the candidate's own actions",
    ),
    (
        CategoryName::ResultsImpact,
        "no results mentioned",
        "clear, quantified results with evident impact",
    ),
    (
        CategoryName::LeadershipAlignment,
        "no clear alignment with the principles",
        "strong alignment with five or more principles",
    ),
    (
        CategoryName::Communication,
        "unclear, disorganized",
        "clear, concise, and well organized",
    ),
];

/// Bar-raiser review prompt. Replace: {story}, {question}
pub const BAR_RAISER_PROMPT_TEMPLATE: &str = r#"You are an experienced Amazon Bar Raiser. Give a critical, in-depth evaluation of the candidate's STAR story as you would in a hiring loop, looking for depth and breadth of Leadership Principles, scope and impact, judgment, red flags, level fit, and growth trajectory.

# STAR Story to Evaluate:
{story}
{question}
# Bar Raiser Evaluation Instructions:
Use exactly these numbered headings:

1. **Bar Raiser Overall Assessment**: Start with one of "Strong Hire", "Inclined", "Not Inclined", or "Strong No Hire", then justify it.

2. **Leadership Principles Deep Dive**: 2-3 principles most strongly demonstrated, one per line as "Principle Name: analysis". Also name principles with concerning gaps.

3. **Scope and Impact Analysis**: Is the scope and impact right for the expected level? A small task, a significant project, or an organizational initiative?

4. **Decision Quality**: Which trade-offs were considered? Was the judgment sound?

5. **Red Flags and Concerns**: One bullet per concern, each a full sentence ending in a period.

6. **Cross-Level Assessment**: Would this story fit a higher or lower level better? Why?

7. **Bar Raiser Questions**: 3-5 numbered follow-up questions, each ending in a question mark.

8. **Comparison to Bar**: How does the candidate compare to others at the same level? Are they raising the bar?
"#;

/// Optional context lines about the question and role.
pub struct StoryContext<'a> {
    pub question: Option<&'a str>,
    pub job_title: Option<&'a str>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn build_evaluation_prompt(story: &str, context: &StoryContext<'_>) -> String {
    let rubric = RUBRIC_ANCHORS
        .iter()
        .map(|(name, low, high)| format!("- {name}: 0 = {low}; 3 = {high}"))
        .collect::<Vec<_>>()
        .join("\n");

    let bands = [
        (OverallBand::Excellent, "18-21"),
        (OverallBand::Good, "14-17"),
        (OverallBand::Satisfactory, "10-13"),
        (OverallBand::NeedsImprovement, "6-9"),
        (OverallBand::Poor, "0-5"),
    ]
    .iter()
    .map(|(band, range)| format!("- {range}: \"{band}\""))
    .collect::<Vec<_>>()
    .join("\n");

    let principles = LEADERSHIP_PRINCIPLES
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut context_lines = String::new();
    if let Some(question) = non_blank(context.question) {
        context_lines.push_str(&format!("\nThe candidate was asked: {question}\n"));
    }
    if let Some(job_title) = non_blank(context.job_title) {
        context_lines.push_str(&format!(
            "\nThe candidate is interviewing for: {job_title}. Judge scope against that role.\n"
        ));
    }

    // Story goes in last so template markers inside it are never substituted.
    EVALUATION_PROMPT_TEMPLATE
        .replace("{rubric}", &rubric)
        .replace("{bands}", &bands)
        .replace("{principles}", &principles)
        .replace("{context}", &context_lines)
        .replace("{story}", story.trim())
}

pub fn build_bar_raiser_prompt(story: &str, question: Option<&str>) -> String {
    let question = non_blank(question)
        .map(|q| format!("\n# Behavioral Question Being Answered:\n{q}\n"))
        .unwrap_or_default();

    BAR_RAISER_PROMPT_TEMPLATE
        .replace("{question}", &question)
        .replace("{story}", story.trim())
}

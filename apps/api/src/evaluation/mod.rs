// STAR story evaluation: prompts, the provider pipeline, and the parsers
// that turn model answers into records for display.
// All model calls go through llm_client.

pub mod bar_raiser;
pub mod display;
pub mod evaluator;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod prompts;
pub mod text_patterns;

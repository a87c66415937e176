// Résumé analysis: input normalization, prompt rendering, structured extraction.
// All LLM calls go through llm_client — no direct Anthropic API calls here.

pub mod analyzer;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod schema;

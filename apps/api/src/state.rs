use crate::analysis::analyzer::Analyzer;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Structured extraction client, built once at startup over the LLM client.
    pub analyzer: Analyzer,
    pub config: Config,
}

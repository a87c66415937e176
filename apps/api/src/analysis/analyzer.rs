//! Structured Extraction Client.
//!
//! `analyze` renders the prompt for a normalized request, sends it to the
//! upstream `StructuredExtractor` with the kind's output schema, and parses the
//! reply into the matching `AnalysisResult` variant.
//!
//! No retries here. Each call is independent; the only shared state is the
//! immutable extractor handle and schema registry.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::models::{
    AnalysisKind, AnalysisOutput, AnalysisResult, CareerPathOutput, MatchOutput, SkillsGapOutput,
    TailorOutput,
};
use crate::analysis::normalize::{AnalysisInput, AnalysisRequest, ValidationError};
use crate::analysis::prompts::render_prompt;
use crate::analysis::schema::OutputSchemas;
use crate::llm_client::prompts::{STRUCTURED_OUTPUT_SYSTEM, UNTRUSTED_INPUT_INSTRUCTION};
use crate::llm_client::{ExtractionRequest, LlmError, StructuredExtractor};

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Network, auth, quota or status failure from the upstream service.
    #[error("{0}")]
    UpstreamFailure(String),

    /// The reply did not satisfy the output schema.
    #[error("the model returned an invalid response: {0}")]
    MalformedResponse(String),

    /// The résumé file is in a format the upstream model cannot read.
    #[error("{0}")]
    UnreadableAttachment(String),
}

impl From<LlmError> for ExtractionError {
    fn from(error: LlmError) -> Self {
        if error.is_malformed_reply() {
            ExtractionError::MalformedResponse(error.to_string())
        } else if error.is_unreadable_attachment() {
            ExtractionError::UnreadableAttachment(error.to_string())
        } else {
            ExtractionError::UpstreamFailure(error.to_string())
        }
    }
}

/// Failure of one downstream operation. `Display` is the message shown to the user.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{}: {source}", .kind.failure_prefix())]
    Extraction {
        kind: AnalysisKind,
        source: ExtractionError,
    },
}

/// Tagged result for direct display: exactly one of `data` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> AnalysisResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }
}

/// The extraction client. Constructed once at startup and cloned into handlers.
#[derive(Clone)]
pub struct Analyzer {
    extractor: Arc<dyn StructuredExtractor>,
    schemas: Arc<OutputSchemas>,
    system: Arc<str>,
}

impl Analyzer {
    pub fn new(extractor: Arc<dyn StructuredExtractor>) -> Self {
        Self::with_schemas(extractor, OutputSchemas::new())
    }

    pub fn with_schemas(extractor: Arc<dyn StructuredExtractor>, schemas: OutputSchemas) -> Self {
        Self {
            extractor,
            schemas: Arc::new(schemas),
            system: format!("{STRUCTURED_OUTPUT_SYSTEM} {UNTRUSTED_INPUT_INSTRUCTION}").into(),
        }
    }

    /// Runs one analysis for an already-normalized request.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, ExtractionError> {
        match request.kind() {
            AnalysisKind::Tailor => self
                .extract::<TailorOutput>(request)
                .await
                .map(AnalysisOutput::into_result),
            AnalysisKind::Match => self
                .extract::<MatchOutput>(request)
                .await
                .map(AnalysisOutput::into_result),
            AnalysisKind::SkillsGap => self
                .extract::<SkillsGapOutput>(request)
                .await
                .map(AnalysisOutput::into_result),
            AnalysisKind::CareerPath => self
                .extract::<CareerPathOutput>(request)
                .await
                .map(AnalysisOutput::into_result),
        }
    }

    /// Downstream operation: normalize raw input, then analyze as `T::KIND`.
    pub async fn run<T: AnalysisOutput>(&self, input: &AnalysisInput) -> Result<T, AnalysisError> {
        let (request_id, request) = prepare(T::KIND, input)?;
        let outcome = self.extract::<T>(&request).await;
        conclude(request_id, T::KIND, outcome)
    }

    /// Same as `run`, with the kind chosen at runtime.
    pub async fn run_kind(
        &self,
        kind: AnalysisKind,
        input: &AnalysisInput,
    ) -> Result<AnalysisResult, AnalysisError> {
        let (request_id, request) = prepare(kind, input)?;
        let outcome = self.analyze(&request).await;
        if let Ok(result) = &outcome {
            debug_assert_eq!(result.kind(), kind);
        }
        conclude(request_id, kind, outcome)
    }

    async fn extract<T: AnalysisOutput>(
        &self,
        request: &AnalysisRequest,
    ) -> Result<T, ExtractionError> {
        debug_assert_eq!(request.kind(), T::KIND);

        let prompt = render_prompt(request);
        let value = self
            .extractor
            .extract(ExtractionRequest {
                system: &self.system,
                prompt: &prompt,
                attachment: request.resume().attachment(),
                schema: self.schemas.get(request.kind()),
            })
            .await?;

        serde_json::from_value::<T>(value)
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))
    }
}

fn prepare(
    kind: AnalysisKind,
    input: &AnalysisInput,
) -> Result<(Uuid, AnalysisRequest), AnalysisError> {
    let request_id = Uuid::new_v4();
    let request = input
        .normalize(kind)
        .inspect_err(|e| info!(%request_id, %kind, "Rejected analysis input: {e}"))?;

    info!(
        %request_id,
        %kind,
        resume = request.resume().variant_name(),
        "Running analysis"
    );
    Ok((request_id, request))
}

fn conclude<T>(
    request_id: Uuid,
    kind: AnalysisKind,
    outcome: Result<T, ExtractionError>,
) -> Result<T, AnalysisError> {
    match outcome {
        Ok(output) => {
            info!(%request_id, %kind, "Analysis succeeded");
            Ok(output)
        }
        Err(source) => {
            warn!(%request_id, %kind, "Analysis failed: {source}");
            Err(AnalysisError::Extraction { kind, source })
        }
    }
}

//! Axum route handlers for the Analysis API.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    Json,
};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::analysis::analyzer::AnalysisResponse;
use crate::analysis::models::{
    AnalysisKind, AnalysisOutput, AnalysisResult, CareerPathOutput, MatchOutput, SkillsGapOutput,
    TailorOutput,
};
use crate::analysis::normalize::{to_data_uri, AnalysisInput};
use crate::errors::AppError;
use crate::state::AppState;

const OCTET_STREAM: &str = "application/octet-stream";

/// POST /api/v1/analysis/tailor
pub async fn handle_tailor(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisInput>, JsonRejection>,
) -> Result<Json<AnalysisResponse<TailorOutput>>, AppError> {
    respond(&state, &payload?.0).await
}

/// POST /api/v1/analysis/match
pub async fn handle_match(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisInput>, JsonRejection>,
) -> Result<Json<AnalysisResponse<MatchOutput>>, AppError> {
    respond(&state, &payload?.0).await
}

/// POST /api/v1/analysis/skills-gap
pub async fn handle_skills_gap(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisInput>, JsonRejection>,
) -> Result<Json<AnalysisResponse<SkillsGapOutput>>, AppError> {
    respond(&state, &payload?.0).await
}

/// POST /api/v1/analysis/career-path
pub async fn handle_career_path(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisInput>, JsonRejection>,
) -> Result<Json<AnalysisResponse<CareerPathOutput>>, AppError> {
    respond(&state, &payload?.0).await
}

/// POST /api/v1/analysis/:kind/upload
///
/// Multipart variant of the four endpoints above. Fields: `resume` (text),
/// `jobDescription` (text), `resumeFile` (file, optional). The file is turned
/// into a data URI and validated like `resumeFileUri`.
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse<AnalysisResult>>, AppError> {
    let kind: AnalysisKind = kind.parse().map_err(AppError::NotFound)?;
    let input = read_upload_form(multipart?).await?;

    let result = state.analyzer.run_kind(kind, &input).await?;
    Ok(Json(AnalysisResponse::success(result)))
}

async fn respond<T: AnalysisOutput>(
    state: &AppState,
    input: &AnalysisInput,
) -> Result<Json<AnalysisResponse<T>>, AppError> {
    let output = state.analyzer.run::<T>(input).await?;
    Ok(Json(AnalysisResponse::success(output)))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<AnalysisInput, AppError> {
    let mut input = AnalysisInput::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" | "resumeText" => input.resume_text = Some(field.text().await?),
            "resumeFileUri" => input.resume_file_uri = Some(field.text().await?),
            "jobDescription" => input.job_description = field.text().await?,
            "resumeFile" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes: Bytes = field.bytes().await?;

                // Browsers send an empty part when no file was chosen
                if bytes.is_empty() {
                    continue;
                }

                let mime = resolve_mime(&bytes, content_type.as_deref(), file_name.as_deref());
                debug!(
                    "Received resume upload: {} bytes, type {mime}",
                    bytes.len()
                );
                input.resume_file_uri = Some(to_data_uri(&mime, &bytes));
            }
            other => debug!("Ignoring unknown form field '{other}'"),
        }
    }

    Ok(input)
}

/// MIME type for an uploaded file. The file's magic bytes win when they are
/// recognized; otherwise the part's content type unless it is missing or
/// generic, then the file extension.
fn resolve_mime(bytes: &[u8], content_type: Option<&str>, file_name: Option<&str>) -> String {
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != OCTET_STREAM);

    if let Some(sniffed) = infer::get(bytes).map(|kind| kind.mime_type()) {
        if let Some(declared) = declared.as_deref().filter(|d| *d != sniffed) {
            warn!("Upload declared as {declared} but its content looks like {sniffed}");
        }
        return sniffed.to_string();
    }

    declared
        .or_else(|| file_name.and_then(mime_from_extension).map(str::to_string))
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

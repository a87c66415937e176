//! Input Normalizer — turns raw form input into an `AnalysisRequest`.
//!
//! Rules:
//! 1. The job description must be at least `MIN_TEXT_CHARS` characters.
//! 2. A non-empty `resumeFileUri` wins over `resumeText`; the text is ignored.
//! 3. Otherwise the résumé text must be at least `MIN_TEXT_CHARS` characters.
//!
//! Lengths are counted in UTF-16 code units on the raw input, without trimming,
//! so the limits agree with the browser form's own counter.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use thiserror::Error;

use crate::analysis::models::AnalysisKind;
use crate::llm_client::Attachment;

pub const MIN_TEXT_CHARS: usize = 50;

/// MIME types accepted for uploaded résumés.
pub const SUPPORTED_RESUME_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Resume must be at least 50 characters, or a file must be uploaded.")]
    ResumeTooShort,

    #[error("Job description must be at least 50 characters.")]
    JobDescriptionTooShort,

    #[error("Resume file must be a base64 data URI (data:<mimetype>;base64,<data>).")]
    MalformedFileUri,

    #[error("Unsupported resume file type '{0}'. Upload a PDF, DOC, DOCX or TXT file.")]
    UnsupportedFileType(String),
}

/// The résumé, either pasted text or an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeSource {
    Text(String),
    FileReference(Attachment),
}

impl ResumeSource {
    /// Short label for logs. Never the résumé content.
    pub fn variant_name(&self) -> &'static str {
        match self {
            ResumeSource::Text(_) => "text",
            ResumeSource::FileReference(_) => "file",
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            ResumeSource::Text(_) => None,
            ResumeSource::FileReference(attachment) => Some(attachment),
        }
    }
}

/// A job description that passed the length check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription(String);

impl JobDescription {
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        if text_length(text) < MIN_TEXT_CHARS {
            return Err(ValidationError::JobDescriptionTooShort);
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A validated, immutable analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    resume: ResumeSource,
    job_description: JobDescription,
    kind: AnalysisKind,
}

impl AnalysisRequest {
    pub fn resume(&self) -> &ResumeSource {
        &self.resume
    }

    pub fn job_description(&self) -> &JobDescription {
        &self.job_description
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }
}

/// Raw submission as it arrives from the UI. `resume` is accepted as an alias
/// of `resumeText` to match the form field name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    #[serde(default, alias = "resume")]
    pub resume_text: Option<String>,
    #[serde(default)]
    pub resume_file_uri: Option<String>,
    #[serde(default)]
    pub job_description: String,
}

impl AnalysisInput {
    pub fn normalize(&self, kind: AnalysisKind) -> Result<AnalysisRequest, ValidationError> {
        normalize(
            self.resume_text.as_deref(),
            self.resume_file_uri.as_deref(),
            &self.job_description,
            kind,
        )
    }
}

/// Validates and reconciles raw inputs into one `AnalysisRequest`.
pub fn normalize(
    resume_text: Option<&str>,
    file_uri: Option<&str>,
    job_description: &str,
    kind: AnalysisKind,
) -> Result<AnalysisRequest, ValidationError> {
    let job_description = JobDescription::parse(job_description)?;

    let resume = match file_uri.filter(|uri| !uri.trim().is_empty()) {
        Some(uri) => ResumeSource::FileReference(parse_data_uri(uri)?),
        None => {
            let text = resume_text.unwrap_or_default();
            if text_length(text) < MIN_TEXT_CHARS {
                return Err(ValidationError::ResumeTooShort);
            }
            ResumeSource::Text(text.to_string())
        }
    };

    Ok(AnalysisRequest {
        resume,
        job_description,
        kind,
    })
}

/// Parses `data:<mimeType>[;param=value]*;base64,<payload>`.
///
/// The MIME type is lowercased and stripped of parameters. The payload must be
/// non-empty standard base64.
pub fn parse_data_uri(uri: &str) -> Result<Attachment, ValidationError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or(ValidationError::MalformedFileUri)?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(ValidationError::MalformedFileUri)?;

    let mut params = header.split(';');
    let mime_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
    let is_base64 = params
        .last()
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("base64"));

    if !is_base64 || !is_mime_essence(&mime_type) || payload.is_empty() {
        return Err(ValidationError::MalformedFileUri);
    }
    if STANDARD.decode(payload).is_err() {
        return Err(ValidationError::MalformedFileUri);
    }
    if !SUPPORTED_RESUME_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(ValidationError::UnsupportedFileType(mime_type));
    }

    Ok(Attachment {
        mime_type,
        base64_data: payload.to_string(),
    })
}

/// `type/subtype` with both halves non-empty and no whitespace.
fn is_mime_essence(mime: &str) -> bool {
    match mime.split_once('/') {
        Some((top, sub)) => {
            !top.is_empty()
                && !sub.is_empty()
                && !sub.contains('/')
                && !mime.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn text_length(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Builds a data URI from raw file bytes.
pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

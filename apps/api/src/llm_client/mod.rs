/// LLM Client — the single point of entry for all model API calls in the résumé assistant.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Analysis code talks to the `StructuredExtractor` trait; `LlmClient` is the
/// production implementation.
///
/// Structured output is obtained by declaring the output schema as the input
/// schema of a single tool and forcing the model to call it.
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Default model when `LLM_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Attachment is not valid base64: {0}")]
    Attachment(#[from] base64::DecodeError),

    #[error("The model cannot read {0} attachments. Upload a PDF or TXT file instead.")]
    UnsupportedAttachment(String),

    #[error("LLM returned no structured output")]
    EmptyContent,
}

impl LlmError {
    /// True when the service answered but the answer was not usable JSON.
    pub fn is_malformed_reply(&self) -> bool {
        matches!(self, LlmError::Parse(_) | LlmError::EmptyContent)
    }

    /// True when the attachment could not be turned into a document the model reads.
    pub fn is_unreadable_attachment(&self) -> bool {
        matches!(self, LlmError::Attachment(_) | LlmError::UnsupportedAttachment(_))
    }
}

/// Connection and model settings, built once from `Config` at startup.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Total attempts for 429/5xx responses and transport errors. 1 disables retries.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub retry_backoff: Duration,
}

/// A binary document sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub base64_data: String,
}

/// JSON Schema the reply must satisfy, plus the tool name it is declared under.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

/// One structured-extraction call: prompt text, optional attachment, output schema.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub attachment: Option<&'a Attachment>,
    pub schema: &'a OutputSchema,
}

/// The upstream structured-extraction capability.
///
/// Implementations return the raw JSON object produced for `request.schema`;
/// validating it against the expected Rust type is the caller's job.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<Value, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    tools: Vec<ToolDefinition<'a>>,
    tool_choice: ToolChoice<'a>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<ContentBlockParam<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlockParam<'a> {
    Document { source: DocumentSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DocumentSource<'a> {
    Base64 { media_type: &'a str, data: &'a str },
    Text { media_type: &'static str, data: String },
}

#[derive(Debug, Serialize)]
struct ToolDefinition<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    choice_type: &'static str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
    pub name: Option<String>,
    pub input: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }

    /// Input of the first `tool_use` block addressed to `tool_name`.
    pub fn tool_input(&self, tool_name: &str) -> Option<&Value> {
        self.content
            .iter()
            .find(|b| b.block_type == "tool_use" && b.name.as_deref() == Some(tool_name))
            .and_then(|b| b.input.as_ref())
    }

    /// The structured reply: the forced tool call, or JSON in a text block as fallback.
    fn into_structured(self, tool_name: &str) -> Result<Value, LlmError> {
        if let Some(input) = self.tool_input(tool_name) {
            return Ok(input.clone());
        }

        let text = self.text().ok_or(LlmError::EmptyContent)?;
        let text = strip_json_fences(text);
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }

        serde_json::from_str(text).map_err(LlmError::Parse)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by the analysis service.
/// Wraps the Anthropic Messages API with optional retry and structured output.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Makes a raw call to the Messages API, returning the full response object.
    /// Retries on 429 (rate limit), 5xx and transport errors with exponential
    /// backoff, up to `max_attempts` total attempts.
    pub async fn call(&self, request: ExtractionRequest<'_>) -> Result<LlmResponse, LlmError> {
        let mut content = Vec::with_capacity(2);
        if let Some(attachment) = request.attachment {
            content.push(ContentBlockParam::Document {
                source: document_source(attachment)?,
            });
        }
        content.push(ContentBlockParam::Text {
            text: request.prompt,
        });

        let request_body = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
            tools: vec![ToolDefinition {
                name: request.schema.name,
                description: request.schema.description,
                input_schema: &request.schema.schema,
            }],
            tool_choice: ToolChoice {
                choice_type: "tool",
                name: request.schema.name,
            },
        };

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.send(&request_body).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    // Exponential backoff: base, 2x base, 4x base
                    let delay = self.config.retry_backoff * (1 << (attempt - 1).min(5));
                    warn!(
                        "LLM call attempt {attempt} failed ({e}), retrying after {}ms...",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, body: &AnthropicRequest<'_>) -> Result<LlmResponse, LlmError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {status}: {body}");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}, stop_reason={:?}",
            llm_response.usage.input_tokens,
            llm_response.usage.output_tokens,
            llm_response.stop_reason
        );

        Ok(llm_response)
    }
}

#[async_trait]
impl StructuredExtractor for LlmClient {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<Value, LlmError> {
        let response = self.call(request).await?;
        response.into_structured(request.schema.name)
    }
}

/// 429, 5xx and transport failures are worth another attempt; other statuses
/// and undecodable bodies are not.
fn is_retryable(error: &LlmError) -> bool {
    match error {
        LlmError::Api { status, .. } => *status == 429 || *status >= 500,
        LlmError::Http(e) => !e.is_decode(),
        _ => false,
    }
}

/// Document block source for an attachment. PDFs go as base64, plain text is
/// decoded and sent as a text document (invalid UTF-8 is replaced). The
/// Messages API reads no other document types.
fn document_source(attachment: &Attachment) -> Result<DocumentSource<'_>, LlmError> {
    let mime_type = attachment.mime_type.as_str();
    if mime_type.eq_ignore_ascii_case("application/pdf") {
        Ok(DocumentSource::Base64 {
            media_type: "application/pdf",
            data: &attachment.base64_data,
        })
    } else if mime_type.eq_ignore_ascii_case("text/plain") {
        let bytes = STANDARD.decode(&attachment.base64_data)?;
        Ok(DocumentSource::Text {
            media_type: "text/plain",
            data: String::from_utf8_lossy(&bytes).into_owned(),
        })
    } else {
        Err(LlmError::UnsupportedAttachment(mime_type.to_string()))
    }
}

/// Pulls `error.message` out of an Anthropic error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<AnthropicError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::json;

    use super::*;

    fn response_from(value: Value) -> LlmResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_structured_output_prefers_tool_call() {
        let response = response_from(json!({
            "content": [
                {"type": "text", "text": "Here you go"},
                {"type": "tool_use", "id": "toolu_1", "name": "report_job_match",
                 "input": {"jobMatchScore": 72, "feedback": "Good overlap"}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "stop_reason": "tool_use"
        }));

        let value = response.into_structured("report_job_match").unwrap();
        assert_eq!(value["jobMatchScore"], 72);
        assert_eq!(value["feedback"], "Good overlap");
    }

    #[test]
    fn test_structured_output_ignores_other_tools() {
        let response = response_from(json!({
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "something_else", "input": {}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }));

        let err = response.into_structured("report_job_match").unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
        assert!(err.is_malformed_reply());
    }

    #[test]
    fn test_structured_output_falls_back_to_fenced_text() {
        let response = response_from(json!({
            "content": [{"type": "text", "text": "```json\n{\"tailoredBulletPoints\": \"- Led\"}\n```"}],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }));

        let value = response.into_structured("report_tailored_resume").unwrap();
        assert_eq!(value["tailoredBulletPoints"], "- Led");
    }

    #[test]
    fn test_structured_output_prose_is_parse_error() {
        let response = response_from(json!({
            "content": [{"type": "text", "text": "I cannot help with that."}],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }));

        let err = response.into_structured("report_job_match").unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
        assert!(err.is_malformed_reply());
    }

    #[test]
    fn test_api_and_transport_errors_are_not_malformed() {
        let err = LlmError::Api {
            status: 401,
            message: "invalid x-api-key".to_string(),
        };
        assert!(!err.is_malformed_reply());
        assert!(!err.is_unreadable_attachment());
        assert!(LlmError::UnsupportedAttachment("application/msword".to_string())
            .is_unreadable_attachment());
    }

    #[test]
    fn test_api_error_message_extracts_nested_message() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(api_error_message(body.to_string()), "Overloaded");
        assert_eq!(api_error_message("gateway timeout".to_string()), "gateway timeout");
    }

    fn attachment(mime_type: &str, base64_data: &str) -> Attachment {
        Attachment {
            mime_type: mime_type.to_string(),
            base64_data: base64_data.to_string(),
        }
    }

    #[test]
    fn test_document_sources_serialize_to_anthropic_shape() {
        let pdf = attachment("application/pdf", "AAAA");
        let block = ContentBlockParam::Document {
            source: document_source(&pdf).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "document", "source": {"type": "base64", "media_type": "application/pdf", "data": "AAAA"}})
        );

        let txt = attachment("text/plain", "aGVsbG8=");
        let block = ContentBlockParam::Document {
            source: document_source(&txt).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "document", "source": {"type": "text", "media_type": "text/plain", "data": "hello"}})
        );
    }

    #[test]
    fn test_word_documents_are_not_sent() {
        for mime in [
            "application/msword",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ] {
            let err = document_source(&attachment(mime, "AAAA")).unwrap_err();
            assert!(matches!(&err, LlmError::UnsupportedAttachment(m) if m == mime));
            assert!(err.to_string().contains("PDF or TXT"));
        }
    }

    #[test]
    fn test_invalid_plain_text_payload_is_an_error() {
        let err = document_source(&attachment("text/plain", "not base64!")).unwrap_err();
        assert!(matches!(err, LlmError::Attachment(_)));
    }

    #[test]
    fn test_tool_choice_forces_named_tool() {
        let choice = ToolChoice {
            choice_type: "tool",
            name: "report_skills_gap",
        };
        assert_eq!(
            serde_json::to_value(&choice).unwrap(),
            json!({"type": "tool", "name": "report_skills_gap"})
        );
    }

    // ── Round trips against a local Messages API stand-in ──────────────────

    #[derive(Debug, Clone)]
    struct Received {
        api_key: Option<String>,
        body: Value,
    }

    /// Serves `status` + `reply` on every request and records what arrived.
    async fn spawn_upstream(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Received>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        let app = Router::new().route(
            "/v1/messages",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let log = log.clone();
                let reply = reply.clone();
                async move {
                    log.lock().unwrap().push(Received {
                        api_key: headers
                            .get("x-api-key")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string),
                        body,
                    });
                    (status, Json(reply))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}/v1/messages"), received)
    }

    fn client_for(api_url: String, max_attempts: u32) -> LlmClient {
        LlmClient::new(LlmConfig {
            api_key: "test-key".to_string(),
            api_url,
            model: "test-model".to_string(),
            max_tokens: 512,
            timeout: Duration::from_secs(5),
            max_attempts,
            retry_backoff: Duration::from_millis(1),
        })
        .unwrap()
    }

    fn match_schema() -> OutputSchema {
        OutputSchema {
            name: "report_job_match",
            description: "Report the match",
            schema: json!({"type": "object"}),
        }
    }

    fn overloaded() -> Value {
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})
    }

    #[tokio::test]
    async fn test_request_body_carries_document_prompt_and_forced_tool() {
        let (url, received) = spawn_upstream(
            StatusCode::OK,
            json!({
                "content": [{"type": "tool_use", "id": "toolu_1", "name": "report_job_match",
                             "input": {"jobMatchScore": 72, "feedback": "Good overlap"}}],
                "usage": {"input_tokens": 10, "output_tokens": 5},
                "stop_reason": "tool_use"
            }),
        )
        .await;
        let client = client_for(url, 1);
        let schema = match_schema();
        let resume = attachment("text/plain", "aGVsbG8=");

        let value = client
            .extract(ExtractionRequest {
                system: "sys",
                prompt: "Compare them",
                attachment: Some(&resume),
                schema: &schema,
            })
            .await
            .unwrap();

        assert_eq!(value, json!({"jobMatchScore": 72, "feedback": "Good overlap"}));

        let received = received.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].api_key.as_deref(), Some("test-key"));
        let body = &received[0].body;
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["system"], "sys");
        assert_eq!(
            body["messages"],
            json!([{
                "role": "user",
                "content": [
                    {"type": "document", "source": {"type": "text", "media_type": "text/plain", "data": "hello"}},
                    {"type": "text", "text": "Compare them"}
                ]
            }])
        );
        assert_eq!(
            body["tools"],
            json!([{"name": "report_job_match", "description": "Report the match", "input_schema": {"type": "object"}}])
        );
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "report_job_match"}));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried_with_single_attempt() {
        let (url, received) = spawn_upstream(StatusCode::INTERNAL_SERVER_ERROR, overloaded()).await;
        let schema = match_schema();

        let err = client_for(url, 1)
            .call(ExtractionRequest {
                system: "sys",
                prompt: "p",
                attachment: None,
                schema: &schema,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 500, ref message } if message == "Overloaded"));
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_retried_up_to_max_attempts() {
        let (url, received) = spawn_upstream(StatusCode::INTERNAL_SERVER_ERROR, overloaded()).await;
        let schema = match_schema();

        let err = client_for(url, 3)
            .call(ExtractionRequest {
                system: "sys",
                prompt: "p",
                attachment: None,
                schema: &schema,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 500, .. }));
        assert_eq!(received.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_never_retried() {
        let (url, received) = spawn_upstream(
            StatusCode::BAD_REQUEST,
            json!({"type": "error", "error": {"type": "invalid_request_error", "message": "boom"}}),
        )
        .await;
        let schema = match_schema();

        let err = client_for(url, 3)
            .call(ExtractionRequest {
                system: "sys",
                prompt: "p",
                attachment: None,
                schema: &schema,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "API error (status 400): boom");
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_attachment_makes_no_request() {
        let (url, received) = spawn_upstream(StatusCode::OK, json!({})).await;
        let schema = match_schema();
        let doc = attachment("application/msword", "AAAA");

        let err = client_for(url, 3)
            .call(ExtractionRequest {
                system: "sys",
                prompt: "p",
                attachment: Some(&doc),
                schema: &schema,
            })
            .await
            .unwrap_err();

        assert!(err.is_unreadable_attachment());
        assert!(received.lock().unwrap().is_empty());
    }
}

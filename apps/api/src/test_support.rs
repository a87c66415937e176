//! Test doubles shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::analysis::analyzer::Analyzer;
use crate::llm_client::{Attachment, ExtractionRequest, LlmError, StructuredExtractor};

/// What one `extract` call received.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub system: String,
    pub prompt: String,
    pub attachment: Option<Attachment>,
    pub schema_name: String,
}

enum StubReply {
    Json(Value),
    Fail(fn() -> LlmError),
}

/// `StructuredExtractor` that returns a canned reply and records every call.
pub struct StubExtractor {
    reply: StubReply,
    calls: Mutex<Vec<CapturedCall>>,
}

impl StubExtractor {
    pub fn replying(value: Value) -> Arc<Self> {
        Arc::new(Self {
            reply: StubReply::Json(value),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: fn() -> LlmError) -> Arc<Self> {
        Arc::new(Self {
            reply: StubReply::Fail(error),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<CapturedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StructuredExtractor for StubExtractor {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<Value, LlmError> {
        self.calls.lock().unwrap().push(CapturedCall {
            system: request.system.to_string(),
            prompt: request.prompt.to_string(),
            attachment: request.attachment.cloned(),
            schema_name: request.schema.name.to_string(),
        });

        match &self.reply {
            StubReply::Json(value) => Ok(value.clone()),
            StubReply::Fail(make_error) => Err(make_error()),
        }
    }
}

pub fn analyzer_with(stub: &Arc<StubExtractor>) -> Analyzer {
    Analyzer::new(stub.clone())
}

pub fn repeat_char(c: char, n: usize) -> String {
    std::iter::repeat(c).take(n).collect()
}

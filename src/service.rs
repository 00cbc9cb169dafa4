//! `{"prompt"}` request envelope and `{"response"}` / `{"error"}` replies.
//!
//! [`PromptService`] is what the binaries talk to. It wraps a resolver when
//! the pipeline was built, or a startup failure message when it was not; in
//! the latter case every request is answered with that error instead of the
//! process refusing to answer at all.

use crate::catalog::{CatalogKey, MitigationRecord};
use crate::render::render_record;
use crate::resolver::{HazardResolver, Outcome, ResolveError};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PromptReply {
    Response {
        response: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        record: Option<RecordDetail>,
    },
    Error {
        error: String,
    },
}

impl PromptReply {
    pub fn error(message: impl Into<String>) -> Self {
        PromptReply::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PromptReply::Error { .. })
    }
}

/// Structured form of a reply, attached when the caller asks for it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordDetail {
    pub catalog: CatalogKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub outcome: Outcome,
    pub mitigation: MitigationRecord,
}

pub struct PromptService {
    pipeline: Result<HazardResolver, String>,
    include_record: bool,
}

impl PromptService {
    pub fn new(resolver: HazardResolver) -> Self {
        Self {
            pipeline: Ok(resolver),
            include_record: false,
        }
    }

    /// A service whose pipeline failed to build; `reason` is sent back on
    /// every request.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            pipeline: Err(reason.into()),
            include_record: false,
        }
    }

    pub fn with_record_detail(mut self, include: bool) -> Self {
        self.include_record = include;
        self
    }

    pub fn resolver(&self) -> Option<&HazardResolver> {
        self.pipeline.as_ref().ok()
    }

    pub fn answer(&self, request: &PromptRequest) -> PromptReply {
        let resolver = match &self.pipeline {
            Ok(resolver) => resolver,
            Err(reason) => return PromptReply::error(reason.clone()),
        };
        let prompt = request.prompt.as_deref().unwrap_or_default();
        log::info!("Received prompt: {prompt}");
        match resolver.resolve(prompt) {
            Ok(resolution) => {
                let response = render_record(resolution.record);
                log::info!("Generated response: {response}");
                let record = self.include_record.then(|| {
                    let label = match resolution.outcome {
                        Outcome::Matched { category, .. } => {
                            resolver.catalog().label(category).map(str::to_string)
                        }
                        Outcome::Fallback(_) => None,
                    };
                    RecordDetail {
                        catalog: resolver.catalog().key().clone(),
                        label,
                        outcome: resolution.outcome,
                        mitigation: resolution.record.clone(),
                    }
                });
                PromptReply::Response { response, record }
            }
            Err(err @ ResolveError::EmptyInput) => {
                log::error!("No prompt provided");
                PromptReply::error(err.to_string())
            }
        }
    }

    /// Parse one JSON request and answer it; malformed JSON becomes an error
    /// reply.
    pub fn answer_json(&self, raw: &str) -> PromptReply {
        match serde_json::from_str::<PromptRequest>(raw.trim()) {
            Ok(request) => self.answer(&request),
            Err(err) => PromptReply::error(format!("Invalid request: {err}")),
        }
    }
}

/// Parse a request stream, accepting a single object, a JSON array, or NDJSON.
pub fn parse_request_stream(input: &str) -> Result<Vec<PromptRequest>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("No input provided on stdin");
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<_>, _>>()
                .context("Unable to parse JSON array of prompt requests"),
            Value::Object(_) => serde_json::from_value(value)
                .map(|request| vec![request])
                .context("Unable to parse prompt request"),
            _ => bail!("Unsupported JSON input; expected object or array"),
        };
    }

    let mut requests = Vec::new();
    for (idx, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: PromptRequest = serde_json::from_str(line)
            .with_context(|| format!("Unable to parse prompt request from line {}", idx + 1))?;
        requests.push(request);
    }

    if requests.is_empty() {
        bail!("No prompt requests found in input stream");
    }

    Ok(requests)
}

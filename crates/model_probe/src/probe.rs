//! One request per model, outcome captured as data
//!
//! A probe never fails its caller: transport problems and unparseable
//! bodies end up inside the [`ProbeResult`] so the run always continues
//! with the next model.

use crate::transport::{ChatRequest, RawResponse, Transport, TransportError};
use serde_json::Value;
use std::fmt;

/// The only status counted as success
pub const SUCCESS_STATUS: u16 = 200;

/// Raw bodies that are not JSON are kept up to this many characters
pub const RAW_BODY_LIMIT: usize = 500;

/// Characters of an error taken from a raw (non-JSON) body
const RAW_ERROR_LIMIT: usize = 100;

/// Truncate to at most `max_chars` characters without splitting one.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((boundary, _)) => &s[..boundary],
        None => s,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Http(u16),
    /// No HTTP response at all
    TransportError,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Http(code) => write!(f, "{}", code),
            ProbeStatus::TransportError => write!(f, "ERROR"),
        }
    }
}

/// Response body, parsed when possible
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(String),
}

impl Payload {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(json) => Payload::Json(json),
            Err(_) => Payload::Raw(truncate_chars(body, RAW_BODY_LIMIT).to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(json) => Some(json),
            Payload::Raw(_) => None,
        }
    }

    /// `{"error": {"message": ..}}` or `{"error": ".."}`
    pub fn error_message(&self) -> Option<String> {
        match self {
            Payload::Json(json) => {
                let error = json.get("error")?;
                error
                    .get("message")
                    .and_then(Value::as_str)
                    .or_else(|| error.as_str())
                    .map(String::from)
            }
            Payload::Raw(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| truncate_chars(text, RAW_ERROR_LIMIT).to_string())
            }
        }
    }

    /// `choices[0].message.content` of a chat completion
    pub fn reply_text(&self) -> Option<&str> {
        self.as_json()?
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Response { status: u16, payload: Payload },
    Failed(TransportError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub model: String,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn from_response(model: &str, response: RawResponse) -> Self {
        Self {
            model: model.to_string(),
            outcome: ProbeOutcome::Response {
                status: response.status,
                payload: Payload::from_body(&response.body),
            },
        }
    }

    pub fn from_error(model: &str, error: TransportError) -> Self {
        Self {
            model: model.to_string(),
            outcome: ProbeOutcome::Failed(error),
        }
    }

    pub fn status(&self) -> ProbeStatus {
        match &self.outcome {
            ProbeOutcome::Response { status, .. } => ProbeStatus::Http(*status),
            ProbeOutcome::Failed(_) => ProbeStatus::TransportError,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.status() {
            ProbeStatus::Http(code) => Some(code),
            ProbeStatus::TransportError => None,
        }
    }

    /// Derived from the status, so it holds for any body
    pub fn is_success(&self) -> bool {
        self.status_code() == Some(SUCCESS_STATUS)
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.outcome {
            ProbeOutcome::Response { payload, .. } => Some(payload),
            ProbeOutcome::Failed(_) => None,
        }
    }

    /// Best diagnostic text available: transport failure or remote error envelope
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            ProbeOutcome::Response { payload, .. } => payload.error_message(),
            ProbeOutcome::Failed(err) => Some(err.to_string()),
        }
    }

    pub fn reply_preview(&self, max_chars: usize) -> Option<&str> {
        self.payload()?
            .reply_text()
            .map(|text| truncate_chars(text, max_chars))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ProbeEvent<'a> {
    Started {
        index: usize,
        total: usize,
        model: &'a str,
    },
    Finished {
        index: usize,
        total: usize,
        result: &'a ProbeResult,
    },
}

/// Sends one greeting per model through a [`Transport`]
pub struct Prober<T> {
    transport: T,
    max_tokens: u32,
}

impl<T: Transport> Prober<T> {
    pub fn new(transport: T, max_tokens: u32) -> Self {
        Self {
            transport,
            max_tokens,
        }
    }

    pub async fn probe(&self, model: &str) -> ProbeResult {
        let request = ChatRequest::greeting(model, self.max_tokens);
        match self.transport.send(&request).await {
            Ok(response) => ProbeResult::from_response(model, response),
            Err(err) => ProbeResult::from_error(model, err),
        }
    }

    /// Probe every model in order, reporting progress around each request
    pub async fn run<F>(&self, models: &[String], mut on_event: F) -> Vec<ProbeResult>
    where
        F: FnMut(ProbeEvent<'_>),
    {
        let total = models.len();
        let mut results = Vec::with_capacity(total);
        for (index, model) in models.iter().enumerate() {
            on_event(ProbeEvent::Started {
                index,
                total,
                model: model.as_str(),
            });
            let result = self.probe(model).await;
            on_event(ProbeEvent::Finished {
                index,
                total,
                result: &result,
            });
            results.push(result);
        }
        results
    }
}

//! HTTP seam between the prober and the chat-completion endpoint
//!
//! The prober only sees [`Transport`], so tests can swap the real
//! [`HttpTransport`] for an in-memory fake.

use crate::config::ProbeConfig;
use serde::Serialize;
use std::error::Error as _;
use std::fmt;
use thiserror::Error;

/// Header carrying the credential; the endpoint does not accept `Authorization: Bearer`
pub const ACCESS_KEY_HEADER: &str = "accessKey";

/// Fixed prompt sent with every probe
pub const GREETING: &str = "你好";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of a single non-streaming chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub stream: bool,
}

impl ChatRequest {
    pub fn greeting(model: &str, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: GREETING.to_string(),
            }],
            max_tokens,
            stream: false,
        }
    }
}

/// Status and body text as received, before any interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connection failed",
            TransportErrorKind::Request => "request failed",
            TransportErrorKind::Body => "body read failed",
            TransportErrorKind::Other => "transport error",
        };
        write!(f, "{}", label)
    }
}

/// A probe that never got a complete HTTP response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else if err.is_request() || err.is_builder() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };

        // reqwest's top-level message hides the interesting part (DNS, refused, TLS)
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::new(kind, message)
    }
}

#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Send one request and return the raw response, or why none arrived
    async fn send(&self, request: &ChatRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport posting to `{base_url}/chat/completions`
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    access_key: String,
}

impl HttpTransport {
    pub fn new(config: &ProbeConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            access_key: config.access_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .header(ACCESS_KEY_HEADER, &self.access_key)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}

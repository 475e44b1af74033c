//! Library module for model_probe
//!
//! Probes a chat-completion API with a list of model identifiers and
//! classifies, per model, whether the configured access key can call it.

pub mod config;
pub mod probe;
pub mod report;
pub mod summary;
pub mod transport;

pub use config::{ConfigError, ProbeConfig};
pub use probe::{Payload, ProbeEvent, ProbeOutcome, ProbeResult, ProbeStatus, Prober};
pub use summary::{Category, RunSummary, Verdict};
pub use transport::{
    ChatMessage, ChatRequest, HttpTransport, RawResponse, Transport, TransportError,
    TransportErrorKind,
};

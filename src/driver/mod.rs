pub mod http;
pub mod session;

pub use http::HttpDriver;
pub use session::SessionContext;

use async_trait::async_trait;
use std::time::Duration;

/// One fully resolved HTTP call
#[derive(Debug, Clone)]
pub struct StepRequest {
    /// HTTP verb, e.g. "GET" or "POST"
    pub method: String,
    /// Path joined against the configured base URL, e.g. "/api/health"
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    /// Per-call override of the client default timeout
    pub timeout: Option<Duration>,
}

impl StepRequest {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            body: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }
}

/// Decoded response payload
#[derive(Debug, Clone)]
pub enum Payload {
    Json(serde_json::Value),
    /// Body that failed structured decoding, kept as raw text
    Raw(String),
    Empty,
}

impl Payload {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the body decoded as structured data
    pub fn is_structured(&self) -> bool {
        matches!(self, Payload::Json(_))
    }
}

/// Normalized result of a single HTTP call. Immutable once produced; the
/// driver never lets a transport fault escape as an error.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Response status, absent on transport failure
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub payload: Payload,
    /// Transport-level fault (connection refused, DNS, timeout)
    pub transport_error: Option<String>,
}

impl Outcome {
    pub fn transport(message: String, elapsed: Duration) -> Self {
        Self {
            status: None,
            elapsed,
            payload: Payload::Empty,
            transport_error: Some(message),
        }
    }

    pub fn is_transport_error(&self) -> bool {
        self.transport_error.is_some()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Body excerpt for failure details, truncated to `max` characters so
    /// reports stay bounded
    pub fn excerpt(&self, max: usize) -> String {
        let text = match &self.payload {
            Payload::Json(value) => value.to_string(),
            Payload::Raw(text) => format!("(unstructured) {text}"),
            Payload::Empty => String::new(),
        };
        if text.chars().count() <= max {
            text
        } else {
            let truncated: String = text.chars().take(max).collect();
            format!("{truncated}…")
        }
    }

    /// Extract a response field by dotted path ("user.id") from a structured
    /// body, stringified for variable capture
    pub fn field(&self, dotted_path: &str) -> Option<String> {
        let body = self.payload.as_json()?;
        let pointer = if dotted_path.starts_with('/') {
            dotted_path.to_string()
        } else {
            format!("/{}", dotted_path.replace('.', "/"))
        };
        let value = body.pointer(&pointer)?;
        Some(match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        })
    }
}

/// Seam between the scenario runner and the wire. The production
/// implementation is [`HttpDriver`]; tests inject mocks.
#[async_trait]
pub trait RequestDriver: Send + Sync {
    /// Issue one request. Session tokens/cookies found in the response are
    /// merged into `session` for reuse by subsequent calls.
    async fn call(&self, request: &StepRequest, session: &mut SessionContext) -> Outcome;
}

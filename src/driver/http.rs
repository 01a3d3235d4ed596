use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::Url;
use std::time::{Duration, Instant};

use super::session::SessionContext;
use super::{Outcome, Payload, RequestDriver, StepRequest};

/// reqwest-backed request driver
pub struct HttpDriver {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDriver {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Join a scenario path against the base URL
    fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("cannot join '{path}' onto {}", self.base_url))
    }
}

#[async_trait]
impl RequestDriver for HttpDriver {
    async fn call(&self, request: &StepRequest, session: &mut SessionContext) -> Outcome {
        let started = Instant::now();

        // Descriptor-level problems (bad verb, unjoinable path) are converted
        // to data like any other fault the driver sees; nothing escapes.
        let method = match request.method.to_uppercase().parse::<reqwest::Method>() {
            Ok(method) => method,
            Err(_) => {
                return Outcome::transport(
                    format!("invalid HTTP method '{}'", request.method),
                    started.elapsed(),
                )
            }
        };
        let url = match self.resolve(&request.path) {
            Ok(url) => url,
            Err(e) => return Outcome::transport(e.to_string(), started.elapsed()),
        };

        let mut req = self.client.request(method, url);

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = session.cookie_header() {
            req = req.header(reqwest::header::COOKIE, cookies);
        }
        if let Some(token) = session.bearer() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        log::debug!("{} -> {}", request.label(), self.base_url);

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                return Outcome::transport(classify_transport(&e), started.elapsed());
            }
        };

        let status = response.status().as_u16();

        // Capture session cookies before consuming the body
        for header in response.headers().get_all(SET_COOKIE) {
            if let Ok(value) = header.to_str() {
                session.absorb_set_cookie(value);
            }
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return Outcome::transport(
                    format!("failed to read response body: {e}"),
                    started.elapsed(),
                );
            }
        };
        let elapsed = started.elapsed();

        let payload = decode_body(&text);
        if let Payload::Json(body) = &payload {
            session.absorb_token(body);
        }

        log::debug!("{} <- HTTP {status} in {}ms", request.label(), elapsed.as_millis());

        Outcome {
            status: Some(status),
            elapsed,
            payload,
            transport_error: None,
        }
    }
}

/// Decode a response body as JSON, falling back to raw text
fn decode_body(text: &str) -> Payload {
    if text.is_empty() {
        return Payload::Empty;
    }
    match serde_json::from_str(text) {
        Ok(value) => Payload::Json(value),
        Err(_) => Payload::Raw(text.to_string()),
    }
}

/// Collapse reqwest transport faults into report-friendly messages
fn classify_transport(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection error - server may be down".to_string()
    } else {
        format!("transport error: {error}")
    }
}

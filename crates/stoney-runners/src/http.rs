// crates/stoney-runners/src/http.rs
// ============================================================================
// Module: HTTP Step Runner
// Description: Executes HTTP steps against the target base URL.
// Purpose: Issue requests under a cancellable timeout and check expectations.
// Dependencies: reqwest, serde_json, stoney-core, url
// ============================================================================

//! ## Overview
//! The request is prepared once per step: the base URL and path are joined,
//! query parameters replace any same-named parameters already present, and a
//! structured body is JSON-encoded with a default `content-type`. Preparation
//! failures (no base URL, unparsable URL, invalid header) are permanent.
//!
//! Each attempt sends the request and reads the whole body under
//! [`race`]; connect, send, and read failures and timeouts are transient.
//! A completed response is evaluated once: status, body substring, and JSON
//! subset checks all run and every mismatch is reported.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;

use reqwest::Client;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde_json::Value;
use stoney_core::HttpExpectation;
use stoney_core::HttpStep;
use stoney_core::StepKind;
use stoney_core::StepResult;
use stoney_core::deep_subset_match;
use url::Url;

use crate::cancel::CancelSignal;
use crate::cancel::Interrupt;
use crate::cancel::race;
use crate::executor::RunnerError;
use crate::executor::StepContext;
use crate::policy::AttemptError;
use crate::policy::run_with_retry;

// ============================================================================
// SECTION: Runner
// ============================================================================

/// HTTP step runner bound to one base URL.
#[derive(Debug, Clone)]
pub struct HttpRunner {
    /// Shared async client.
    client: Client,
    /// Target base URL, when configured.
    base_url: Option<String>,
}

/// Request prepared once and replayed on every attempt.
struct PreparedRequest {
    /// Request method.
    method: Method,
    /// Fully resolved URL including query parameters.
    url: Url,
    /// Request headers.
    headers: HeaderMap,
    /// Encoded request body.
    body: Option<String>,
}

/// Fully read response.
struct HttpResponse {
    /// Status code.
    status: u16,
    /// Raw `content-type` header value.
    content_type: String,
    /// Body decoded as UTF-8 (lossy).
    body: String,
}

impl HttpRunner {
    /// Builds a runner for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Client`] when the HTTP client cannot be built.
    pub fn new(base_url: Option<String>) -> Result<Self, RunnerError> {
        let client = Client::builder()
            .user_agent(concat!("stoney/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| RunnerError::Client(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
        })
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Executes one HTTP step.
    pub async fn execute(
        &self,
        step: &HttpStep,
        expect: Option<&HttpExpectation>,
        ctx: &StepContext<'_>,
    ) -> StepResult {
        let title = format!("http {} {}", step.method, step.path);
        let mut result = StepResult::new(StepKind::Http, title.clone());
        result.method = Some(step.method.clone());

        let request = match self.prepare(step) {
            Ok(request) => request,
            Err(message) => return result.with_failure(format!("Request error: {message}")),
        };
        result.url = Some(request.url.to_string());

        let policy = ctx.defaults.policy_for(StepKind::Http, step.timeout_ms, step.retries);
        let request = &request;
        let cancel = ctx.cancel;
        let attempted = run_with_retry(&policy, cancel, ctx.events, &title, move |_| {
            self.attempt(request, policy.timeout, cancel)
        })
        .await;

        let result = result.with_attempts(attempted.attempts);
        match attempted.outcome {
            Ok(response) => evaluate(result, &response, expect),
            Err(AttemptError::Cancelled) => result.with_failure("cancelled"),
            Err(err) => result.with_failure(format!("Network/timeout error: {err}")),
        }
    }

    /// Resolves the URL, headers, and body for a step.
    fn prepare(&self, step: &HttpStep) -> Result<PreparedRequest, String> {
        let method = Method::from_bytes(step.method.as_bytes())
            .map_err(|_| format!("invalid method: {}", step.method))?;
        let base_url = self.base_url.as_deref().ok_or_else(|| "no base URL configured".to_string())?;
        let joined = format!("{}{}", base_url.trim_end_matches('/'), step.path);
        let mut url = Url::parse(&joined).map_err(|err| format!("invalid url {joined}: {err}"))?;
        apply_query(&mut url, &step.query);

        let mut headers = HeaderMap::new();
        for (name, value) in &step.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name: {name}"))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| format!("invalid value for header {name}"))?;
            headers.insert(header_name, header_value);
        }

        let body = match &step.body {
            None => None,
            Some(Value::String(raw)) => Some(raw.clone()),
            Some(structured) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(
                    serde_json::to_string(structured)
                        .map_err(|err| format!("failed to encode body: {err}"))?,
                )
            }
        };

        Ok(PreparedRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Sends the request and reads the full response once.
    async fn attempt(
        &self,
        request: &PreparedRequest,
        timeout: Duration,
        cancel: &CancelSignal,
    ) -> Result<HttpResponse, AttemptError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let exchange = async move {
            let response =
                builder.send().await.map_err(|err| AttemptError::Transient(error_chain(&err)))?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let bytes = response.bytes().await.map_err(|err| {
                AttemptError::Transient(format!("failed to read response: {}", error_chain(&err)))
            })?;
            Ok(HttpResponse {
                status,
                content_type,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        };
        match race(exchange, timeout, cancel).await {
            Ok(outcome) => outcome,
            Err(Interrupt::TimedOut) => {
                Err(AttemptError::Transient(format!("request timeout after {}ms", timeout.as_millis())))
            }
            Err(Interrupt::Cancelled) => Err(AttemptError::Cancelled),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Sets query parameters, replacing any existing values for the same keys.
fn apply_query(url: &mut Url, query: &BTreeMap<String, String>) {
    if query.is_empty() {
        return;
    }
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !query.contains_key(key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    pairs.extend_pairs(retained);
    pairs.extend_pairs(query);
}

/// Returns true for JSON media types.
fn is_json(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Flattens an error and its sources into one line.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

/// Checks a completed response against the expectation.
fn evaluate(
    mut result: StepResult,
    response: &HttpResponse,
    expect: Option<&HttpExpectation>,
) -> StepResult {
    result.status = Some(response.status);
    let decoded = if is_json(&response.content_type) {
        serde_json::from_str::<Value>(&response.body).map_or_else(
            |_| {
                result.notes.push("Response advertised JSON but failed to parse JSON.".to_string());
                None
            },
            Some,
        )
    } else {
        None
    };

    let Some(expect) = expect else {
        return result;
    };
    if let Some(status) = expect.status
        && status != response.status
    {
        result = result.with_failure(format!("Expected status {status} but got {}.", response.status));
    }
    if let Some(needle) = &expect.body_contains
        && !response.body.contains(needle.as_str())
    {
        result = result.with_failure(format!("Expected body to contain: \"{needle}\""));
    }
    if let Some(pattern) = &expect.json {
        match &decoded {
            None => {
                result = result
                    .with_failure("Expected JSON subset match, but response was not JSON.");
            }
            Some(actual) if !deep_subset_match(actual, pattern) => {
                result = result.with_failure("Expected JSON subset did not match response JSON.");
            }
            Some(_) => {}
        }
    }
    result
}

// crates/stoney-issues/src/client.rs
// ============================================================================
// Module: Issue Tracker Client
// Description: Authenticated fetch of issue summaries and descriptions.
// Purpose: Retrieve the rich-text document a suite is embedded in.
// Dependencies: reqwest, serde_json, stoney-core, url
// ============================================================================

//! ## Overview
//! Connection settings (base address, identity, credential) are all
//! required; a missing one fails before any request is sent. Issues are
//! fetched from `{base}/rest/api/3/issue/{key}?fields=summary,description`
//! with HTTP basic authentication. Non-success responses fail with the
//! status and body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use stoney_core::EnvLookup;
use url::Url;

use crate::IssueError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the tracker base URL.
pub const BASE_URL_ENV: &str = "JIRA_BASE_URL";
/// Environment variable holding the account identity.
pub const EMAIL_ENV: &str = "JIRA_EMAIL";
/// Environment variable holding the API credential.
pub const TOKEN_ENV: &str = "JIRA_API_TOKEN";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Issue tracker connection settings.
///
/// # Invariants
/// - All fields are non-empty.
/// - `base_url` has no trailing slash.
#[derive(Clone, PartialEq, Eq)]
pub struct IssueTrackerConfig {
    /// Tracker base URL.
    base_url: String,
    /// Account identity.
    email: String,
    /// API credential.
    token: String,
}

impl std::fmt::Debug for IssueTrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueTrackerConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl IssueTrackerConfig {
    /// Builds settings from optional parts.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::MissingConfig`] naming every missing part.
    pub fn new(
        base_url: Option<String>,
        email: Option<String>,
        token: Option<String>,
    ) -> Result<Self, IssueError> {
        let present = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
        match (present(base_url), present(email), present(token)) {
            (Some(base_url), Some(email), Some(token)) => Ok(Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                email,
                token,
            }),
            (base_url, email, token) => {
                let missing: Vec<&str> = [
                    (base_url.is_none(), BASE_URL_ENV),
                    (email.is_none(), EMAIL_ENV),
                    (token.is_none(), TOKEN_ENV),
                ]
                .into_iter()
                .filter_map(|(missing, name)| missing.then_some(name))
                .collect();
                Err(IssueError::MissingConfig(missing.join("/")))
            }
        }
    }

    /// Reads settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::MissingConfig`] when any variable is unset.
    pub fn from_env(env: &dyn EnvLookup) -> Result<Self, IssueError> {
        Self::new(env.var(BASE_URL_ENV), env.var(EMAIL_ENV), env.var(TOKEN_ENV))
    }

    /// Returns the tracker base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the URL of one issue.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Fetch`] when the base URL cannot carry a path.
    pub fn issue_url(&self, key: &str) -> Result<Url, IssueError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| IssueError::Fetch(format!("invalid issue tracker url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| IssueError::Fetch("issue tracker url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["rest", "api", "3", "issue", key]);
        url.set_query(Some("fields=summary,description"));
        Ok(url)
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Issue summary and description.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Issue key.
    pub key: String,
    /// Issue summary, or the key when absent.
    pub summary: String,
    /// Rich-text description tree.
    pub description: Value,
}

/// Async issue tracker client.
#[derive(Debug, Clone)]
pub struct IssueClient {
    /// Shared HTTP client.
    client: Client,
    /// Connection settings.
    config: IssueTrackerConfig,
}

impl IssueClient {
    /// Builds a client with a whole-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Fetch`] when the HTTP client cannot be built.
    pub fn new(config: IssueTrackerConfig, timeout: Duration) -> Result<Self, IssueError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stoney/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| IssueError::Fetch(format!("http client build failed: {err}")))?;
        Ok(Self {
            client,
            config,
        })
    }

    /// Fetches one issue.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Fetch`] on transport failure or non-success
    /// status, and [`IssueError::Parse`] when the body is not JSON.
    pub async fn fetch_issue(&self, key: &str) -> Result<Issue, IssueError> {
        let url = self.config.issue_url(key)?;
        let response = self
            .client
            .get(url)
            .basic_auth(&self.config.email, Some(&self.config.token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| IssueError::Fetch(format!("issue {key}: {err}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| IssueError::Fetch(format!("issue {key}: failed to read response: {err}")))?;
        if !status.is_success() {
            return Err(IssueError::Fetch(format!(
                "issue fetch failed for {key} ({}): {body}",
                status.as_u16()
            )));
        }
        let issue: Value = serde_json::from_str(&body)
            .map_err(|err| IssueError::Parse(format!("issue {key}: {err}")))?;
        let fields = issue.get("fields");
        let summary = fields
            .and_then(|fields| fields.get("summary"))
            .and_then(Value::as_str)
            .filter(|summary| !summary.is_empty())
            .unwrap_or(key)
            .to_string();
        let description =
            fields.and_then(|fields| fields.get("description")).cloned().unwrap_or(Value::Null);
        Ok(Issue {
            key: key.to_string(),
            summary,
            description,
        })
    }
}

//! GitHub REST API client for pull request comments
//!
//! Posts the database check summary to the pull request that triggered the
//! workflow. Posting is best-effort: the caller logs failures and carries on.

use std::time::Duration;

use async_trait::async_trait;
use dbcheck_core::{Credential, PostError, Summary, SummaryPoster};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::GithubError;
use crate::Result;

/// Public GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Maximum times to retry a request before giving up
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// REST API base URL
    pub api_url: String,
    /// Repository in `owner/name` form
    pub repository: String,
    /// Access token; posting is skipped without one
    pub token: Option<Credential>,
    /// Pull request to comment on
    pub pull_request: Option<u64>,
    /// Retries after the first attempt on transport errors, 429 and 5xx
    pub max_retries: u32,
    /// Initial delay between retries; doubles on every retry
    pub backoff: Duration,
}

impl GithubConfig {
    /// Create a config for `owner/name` against the public API
    pub fn new(repository: &str) -> Self {
        GithubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            repository: repository.to_string(),
            token: None,
            pull_request: None,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_secs(1),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: Credential) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_pull_request(mut self, number: u64) -> Self {
        self.pull_request = Some(number);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Repository owner, used as the User-Agent as GitHub recommends
    pub fn owner(&self) -> Result<&str> {
        match self.repository.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(owner),
            _ => Err(GithubError::InvalidRepository(self.repository.clone())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitWindow,
}

#[derive(Debug, Deserialize)]
struct RateLimitWindow {
    limit: u64,
    remaining: u64,
    reset: u64,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

/// A comment created on a pull request
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedComment {
    pub id: u64,
    pub html_url: Option<String>,
}

/// GitHub client for pull request comments
pub struct GithubClient {
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubClient {
    /// Create a new GitHub client
    pub fn new(config: GithubConfig) -> Result<Self> {
        let user_agent = config.owner()?.to_string();
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;

        Ok(GithubClient {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn token(&self) -> Result<&str> {
        self.config
            .token
            .as_ref()
            .map(Credential::expose)
            .ok_or(GithubError::MissingToken)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    /// Remaining core API requests in the current window.
    ///
    /// Returns `None` when the server has rate limiting disabled.
    pub async fn remaining_core_requests(&self) -> Result<Option<u64>> {
        let token = self.token()?;
        let url = self.url("/rate_limit");

        let response = match self
            .send_with_retry(|http| {
                http.get(&url)
                    .header("Authorization", format!("token {token}"))
                    .header("Accept", "application/vnd.github+json")
            })
            .await
        {
            Ok(response) => response,
            // GitHub Enterprise answers 404 when rate limiting is disabled
            Err(GithubError::Status { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };

        let data: RateLimitResponse = response.json().await?;
        debug!(
            limit = data.resources.core.limit,
            remaining = data.resources.core.remaining,
            reset = data.resources.core.reset,
            "GitHub core API request allotment"
        );
        Ok(Some(data.resources.core.remaining))
    }

    /// Post `body` as a comment on the configured pull request
    pub async fn post_comment(&self, body: &str) -> Result<CreatedComment> {
        let token = self.token()?;
        let number = self.config.pull_request.ok_or(GithubError::NoPullRequest)?;
        let url = self.url(&format!(
            "/repos/{}/issues/{}/comments",
            self.config.repository, number
        ));

        info!("Posting database check summary to pull request #{}", number);
        let response = self
            .send_with_retry(|http| {
                http.post(&url)
                    .header("Authorization", format!("token {token}"))
                    .header("Accept", "application/vnd.github+json")
                    .json(&CommentRequest { body })
            })
            .await?;

        let comment: CreatedComment = response.json().await?;
        debug!(comment_id = comment.id, url = ?comment.html_url, "comment created");
        Ok(comment)
    }

    /// Send a request, retrying transport errors, 429 and 5xx with backoff.
    ///
    /// A `Retry-After` header on the failed response overrides the backoff
    /// for that retry.
    async fn send_with_retry(
        &self,
        build_request: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let attempts = self.config.max_retries + 1;
        let mut backoff = self.config.backoff;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let mut wait = backoff;
            match build_request(&self.http_client).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let code = status.as_u16();
                    if let Some(retry_after) = retry_after(&response) {
                        wait = retry_after;
                    }
                    let message = error_message(response).await;

                    if code == 403 && message.to_ascii_lowercase().contains("rate limit") {
                        return Err(GithubError::RateLimited);
                    }
                    if code != 429 && !status.is_server_error() {
                        return Err(GithubError::Status {
                            status: code,
                            message,
                        });
                    }
                    last_error = format!("HTTP {code}: {message}");
                }
                Err(err) => {
                    last_error = err.to_string();
                }
            }

            if attempt < attempts {
                warn!(
                    "retry {}/{} in {:?} ({})",
                    attempt, self.config.max_retries, wait, last_error
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }
        }

        Err(GithubError::RetriesExhausted {
            attempts,
            last_error,
        })
    }
}

/// Delay requested by a `Retry-After` header given in seconds.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Best-effort extraction of GitHub's `message` field from an error body
async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(text)
}

#[async_trait]
impl SummaryPoster for GithubClient {
    async fn post_summary(&self, summary: &Summary) -> std::result::Result<(), PostError> {
        if self.config.pull_request.is_none() {
            return Err(GithubError::NoPullRequest.into());
        }

        if let Some(0) = self.remaining_core_requests().await? {
            warn!("GitHub API request quota has been reached. Giving up for now.");
            return Err(PostError::RateLimited);
        }

        self.post_comment(&summary.render_markdown()).await?;
        Ok(())
    }
}

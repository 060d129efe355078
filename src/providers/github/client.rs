use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::config::GitHubConfig;
use crate::error::{LiveDataFailure, Result, VisualizerError};

use super::types::{GitHubJob, GitHubWorkflowRun, WorkflowJobsResponse, WorkflowRunsResponse};

/// The API never returns more than this many runs per page.
const MAX_PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";

/// GitHub API client for fetching workflow data.
pub struct GitHubClient {
    client: Client,
    /// API root, always ending in `/`
    api_url: Url,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        if let Some(token) = config.token.as_deref().filter(|t| !t.trim().is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|e| VisualizerError::invalid_config(format!("Invalid GitHub token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(concat!("pipeviz/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| VisualizerError::invalid_config(format!("Failed to create HTTP client: {e}")))?;

        let mut api_url = Url::parse(&config.base_url)
            .map_err(|e| VisualizerError::invalid_config(format!("Invalid base URL: {e}")))?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        Ok(Self { client, api_url })
    }

    /// Fetch the most recent workflow runs, newest first.
    ///
    /// Walks result pages until `limit` runs are collected or a short page
    /// shows there are no more.
    pub async fn fetch_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        limit: usize,
    ) -> std::result::Result<Vec<GitHubWorkflowRun>, LiveDataFailure> {
        let mut all_runs = Vec::new();
        let per_page = limit.clamp(1, MAX_PER_PAGE);
        let mut page = 1;

        loop {
            let mut url = self.endpoint(&format!("repos/{owner}/{repo}/actions/runs"))?;
            url.query_pairs_mut()
                .append_pair("per_page", &per_page.to_string())
                .append_pair("page", &page.to_string());

            let response: WorkflowRunsResponse = self.get_json(url).await?;
            let response_len = response.workflow_runs.len();
            debug!("Page {page} returned {response_len} runs");
            all_runs.extend(response.workflow_runs);

            if response_len < per_page || all_runs.len() >= limit {
                break;
            }
            page += 1;
        }

        all_runs.truncate(limit);
        Ok(all_runs)
    }

    /// Fetch jobs for a specific workflow run.
    pub async fn fetch_jobs_for_run(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> std::result::Result<Vec<GitHubJob>, LiveDataFailure> {
        let url = self.endpoint(&format!("repos/{owner}/{repo}/actions/runs/{run_id}/jobs"))?;
        let response: WorkflowJobsResponse = self.get_json(url).await?;
        Ok(response.jobs)
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, LiveDataFailure> {
        self.api_url
            .join(path)
            .map_err(|e| LiveDataFailure::Network(format!("invalid request URL: {e}")))
    }

    async fn get_json<T>(&self, url: Url) -> std::result::Result<T, LiveDataFailure>
    where
        T: DeserializeOwned,
    {
        debug!("GET {url}");
        let response = self.client.get(url).send().await.map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_failure(response).await);
        }

        let body = response.text().await.map_err(transport_failure)?;
        serde_json::from_str(&body).map_err(|e| LiveDataFailure::Decode(e.to_string()))
    }
}

fn transport_failure(error: reqwest::Error) -> LiveDataFailure {
    if error.is_timeout() {
        LiveDataFailure::Timeout
    } else if error.is_decode() {
        LiveDataFailure::Decode(error.to_string())
    } else {
        LiveDataFailure::Network(error.to_string())
    }
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

async fn status_failure(response: Response) -> LiveDataFailure {
    let status = response.status();
    let reset_at = header(&response, "x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    let exhausted = header(&response, "x-ratelimit-remaining") == Some("0");

    match status {
        StatusCode::TOO_MANY_REQUESTS => rate_limited(reset_at),
        StatusCode::FORBIDDEN if exhausted => rate_limited(reset_at),
        StatusCode::NOT_FOUND => LiveDataFailure::NotFound,
        _ => {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            LiveDataFailure::Api {
                status: status.as_u16(),
                message: api_message(&message),
            }
        }
    }
}

fn rate_limited(reset_at: Option<DateTime<Utc>>) -> LiveDataFailure {
    match reset_at {
        Some(at) => warn!("GitHub rate limit exhausted until {at}"),
        None => warn!("GitHub rate limit exhausted"),
    }
    LiveDataFailure::RateLimited { reset_at }
}

/// Pulls `message` out of a GitHub error body, falling back to the raw text.
fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

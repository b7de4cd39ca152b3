use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::parser::entry::ProvenanceFields;
use crate::settings::Settings;

const BASE_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { status: StatusCode, url: String },
    #[error("README response has no download_url")]
    MissingDownloadUrl,
    #[error("invalid GitHub token header: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
}

#[derive(Deserialize)]
struct ReadmeResponse {
    download_url: Option<String>,
}

/// GitHub REST client. The token comes from [`Settings`], never from globals.
pub struct GitHubClient {
    http: Client,
    api_base: String,
    api_headers: HeaderMap,
    max_retries: u32,
}

impl GitHubClient {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let mut api_headers = HeaderMap::new();
        api_headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        if let Some(token) = &settings.github_token {
            let mut value = HeaderValue::from_str(&format!("token {}", token))?;
            value.set_sensitive(true);
            api_headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_headers,
            max_retries: settings.max_retries,
        })
    }

    /// Fetch the raw README text of `repo` (`owner/name`).
    pub async fn fetch_readme(&self, repo: &str) -> Result<String, FetchError> {
        let url = format!("{}/repos/{}/readme", self.api_base, repo);
        let readme: ReadmeResponse = self.get(&url, true).await?.json().await?;
        let download_url = readme
            .download_url
            .filter(|u| !u.is_empty())
            .ok_or(FetchError::MissingDownloadUrl)?;
        // download_url is pre-signed for private repos; no API headers
        Ok(self.get(&download_url, false).await?.text().await?)
    }

    pub async fn fetch_provenance(&self, repo: &str) -> Result<ProvenanceFields, FetchError> {
        let url = format!("{}/repos/{}", self.api_base, repo);
        Ok(self.get(&url, true).await?.json().await?)
    }

    /// GET with retry on 429 and 5xx.
    async fn get(&self, url: &str, api: bool) -> Result<Response, FetchError> {
        let mut attempt = 0;
        loop {
            let mut request = self.http.get(url);
            if api {
                request = request.headers(self.api_headers.clone());
            }
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if !retryable || attempt >= self.max_retries {
                debug!("GET {} failed with {}", url, status);
                return Err(FetchError::Status {
                    status,
                    url: url.to_string(),
                });
            }

            let backoff = backoff_delay(attempt);
            warn!(
                "{} on {} (attempt {}/{}), backing off {:.1}s",
                status,
                url,
                attempt + 1,
                self.max_retries,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// 1s, 2s, 4s … capped at five minutes.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = 2u64
        .checked_pow(attempt)
        .and_then(|factor| BASE_BACKOFF_MS.checked_mul(factor))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS));
    Duration::from_millis(ms)
}

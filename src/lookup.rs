//! Third-party metadata lookup for Instagram posts.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::InstaConfig;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lookup service returned {0}")]
    Status(reqwest::StatusCode),

    #[error("Response has no video_url")]
    MissingVideoUrl,
}

/// Resolves a post URL to a direct video reference.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve_video(&self, url: &str) -> Result<String, LookupError>;
}

#[derive(Deserialize)]
struct LookupResponse {
    video_url: Option<String>,
}

/// Calls `GET {api_url}?url={url}`, authenticated with `x-api-key` when a key
/// is configured.
pub struct HttpMetadataResolver {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpMetadataResolver {
    pub fn new(config: &InstaConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client with timeout, using default");
                Client::default()
            });
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

fn video_url_from(body: &str) -> Result<String, LookupError> {
    let response: LookupResponse =
        serde_json::from_str(body).map_err(|_| LookupError::MissingVideoUrl)?;
    response
        .video_url
        .filter(|u| !u.trim().is_empty())
        .ok_or(LookupError::MissingVideoUrl)
}

#[async_trait]
impl MetadataResolver for HttpMetadataResolver {
    async fn resolve_video(&self, url: &str) -> Result<String, LookupError> {
        let mut request = self.client.get(&self.api_url).query(&[("url", url)]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }

        let body = response.text().await?;
        video_url_from(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_url_from_response() {
        let url = video_url_from(r#"{"video_url": "https://cdn.example/v.mp4", "title": "x"}"#);
        assert_eq!(url.unwrap(), "https://cdn.example/v.mp4");
    }

    #[test]
    fn test_malformed_responses() {
        for body in ["{}", r#"{"video_url": ""}"#, r#"{"video_url": null}"#, "<html>", "[]"] {
            assert!(
                matches!(video_url_from(body), Err(LookupError::MissingVideoUrl)),
                "{body}"
            );
        }
    }
}

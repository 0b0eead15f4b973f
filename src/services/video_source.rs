use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::models::{ContentRef, QualityVariant, VideoSource};
use crate::utils::{AppError, AppResult};

/// Resolves a content reference to its playable quality variants
#[async_trait]
pub trait VideoSourceResolver: Send + Sync {
    async fn resolve(&self, content: &ContentRef) -> AppResult<VideoSource>;
}

#[derive(Debug, Deserialize)]
struct EpisodeVideoResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    video_urls: Map<String, Value>,
    provider: Option<String>,
    #[serde(default)]
    cached: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: String,
}

/// Client for the scraping backend's `/api/episode/{n}/video` endpoint
pub struct BackendVideoSource {
    client: reqwest::Client,
    base_url: String,
}

impl BackendVideoSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &NetworkConfig) -> AppResult<Self> {
        Self::new(config.backend_url.clone(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_transport_error(&self, error: reqwest::Error) -> AppError {
        if error.is_connect() || error.is_timeout() {
            AppError::NetworkUnavailable(format!("{} is not reachable", self.base_url))
        } else {
            AppError::Http(error)
        }
    }
}

#[async_trait]
impl VideoSourceResolver for BackendVideoSource {
    async fn resolve(&self, content: &ContentRef) -> AppResult<VideoSource> {
        let ContentRef::Episode(episode) = *content else {
            return Err(AppError::ContentNotFound(format!(
                "the video backend only serves episodes, not {content}"
            )));
        };

        let url = format!("{}/api/episode/{}/video", self.base_url, episode);
        debug!("Resolving video source: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorDetail>(&text)
                .map(|d| d.detail)
                .unwrap_or(text);
            warn!("Video backend returned {} for {}: {}", status, content, detail);

            return Err(match status.as_u16() {
                400 | 404 => AppError::ContentNotFound(detail),
                _ => AppError::Backend(format!("{status}: {detail}")),
            });
        }

        let body: EpisodeVideoResponse = response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("unexpected reply: {e}")))?;

        if !body.success {
            return Err(AppError::ContentNotFound(
                body.error
                    .unwrap_or_else(|| format!("no video for {content}")),
            ));
        }

        let variants = body
            .video_urls
            .into_iter()
            .filter_map(|(name, url)| match url {
                Value::String(url) => Some(QualityVariant { name, url }),
                _ => None,
            })
            .collect();

        let mut source = VideoSource::new(variants);
        if source.is_empty() {
            return Err(AppError::ContentNotFound(format!(
                "no playable variants for {content}"
            )));
        }
        source.provider = body.provider;
        source.cached = body.cached;

        info!(
            "Resolved {} with {} quality variant(s) (cached: {})",
            content,
            source.variants.len(),
            source.cached
        );
        Ok(source)
    }
}

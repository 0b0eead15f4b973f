use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::models::{ContentRef, SegmentKind, SkipWindow, SkipWindows};
use crate::utils::{AppError, AppResult};

/// A categorized interval as reported by a timing provider, before it is
/// collapsed onto the intro/outro slots
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSegment {
    pub category: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimedSegment {
    pub fn new(category: impl Into<String>, start_secs: f64, end_secs: f64) -> Self {
        Self {
            category: category.into(),
            start_secs,
            end_secs,
        }
    }
}

/// Source of intro/outro timings for episodes
#[async_trait]
pub trait SkipTimingProvider: Send + Sync {
    /// `Ok(None)` when the provider has no data for this episode
    async fn fetch_segments(&self, episode: u32) -> AppResult<Option<Vec<TimedSegment>>>;
}

/// Which slot a provider category belongs to, if any
pub fn category_slot(category: &str) -> Option<SegmentKind> {
    match category.to_ascii_lowercase().as_str() {
        "op" | "mixed-op" | "opening" | "intro" => Some(SegmentKind::Intro),
        "ed" | "mixed-ed" | "ending" | "outro" | "credits" => Some(SegmentKind::Outro),
        _ => None,
    }
}

/// Collapse provider segments onto the two output slots. The first valid
/// interval of each slot wins; unknown categories are ignored.
pub fn map_segments(segments: &[TimedSegment]) -> SkipWindows {
    let mut windows = SkipWindows::default();

    for segment in segments {
        let Some(slot) = category_slot(&segment.category) else {
            debug!("Ignoring skip segment category '{}'", segment.category);
            continue;
        };
        let Some(window) = SkipWindow::from_secs_f64(segment.start_secs, segment.end_secs) else {
            warn!(
                "Discarding invalid {} interval {}..{}",
                slot, segment.start_secs, segment.end_secs
            );
            continue;
        };
        let target = match slot {
            SegmentKind::Intro => &mut windows.intro,
            SegmentKind::Outro => &mut windows.outro,
        };
        if target.is_none() {
            *target = Some(window);
        }
    }

    windows
}

/// Turns a content reference into the skip windows for its session.
///
/// Only episodes are looked up. A provider failure or a miss degrades to a
/// fixed intro-only window; it is never reported as an error.
pub struct SkipTimingResolver {
    provider: Arc<dyn SkipTimingProvider>,
    fallback: SkipWindows,
}

impl SkipTimingResolver {
    pub fn new(provider: Arc<dyn SkipTimingProvider>, fallback_intro: SkipWindow) -> Self {
        Self {
            provider,
            fallback: SkipWindows::fallback(fallback_intro),
        }
    }

    pub fn fallback(&self) -> SkipWindows {
        self.fallback
    }

    /// One attempt, no retries. `None` means segment timing does not apply
    /// to this kind of content.
    pub async fn resolve(&self, content: &ContentRef) -> Option<SkipWindows> {
        let ContentRef::Episode(episode) = *content else {
            debug!("Skip timing not applicable to {}", content);
            return None;
        };

        match self.provider.fetch_segments(episode).await {
            Ok(Some(segments)) => {
                let windows = map_segments(&segments);
                info!(
                    "Resolved skip windows for episode {}: intro={:?} outro={:?}",
                    episode, windows.intro, windows.outro
                );
                Some(windows)
            }
            Ok(None) => {
                warn!("No skip timing for episode {}, using fallback intro", episode);
                Some(self.fallback())
            }
            Err(e) => {
                warn!(
                    "Skip timing lookup failed for episode {}: {}; using fallback intro",
                    episode, e
                );
                Some(self.fallback())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SkipTimesResponse {
    found: bool,
    #[serde(default)]
    results: Vec<SkipTimeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkipTimeResult {
    interval: SkipInterval,
    skip_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkipInterval {
    start_time: f64,
    end_time: f64,
}

/// HTTP client for an AniSkip-compatible timing service
pub struct AniSkipProvider {
    client: reqwest::Client,
    base_url: String,
    series_id: u32,
}

impl AniSkipProvider {
    pub fn new(base_url: impl Into<String>, series_id: u32, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            series_id,
        })
    }

    pub fn from_config(config: &NetworkConfig) -> AppResult<Self> {
        Self::new(
            config.skip_timing_url.clone(),
            config.skip_timing_series_id,
            config.timeout(),
        )
    }
}

#[async_trait]
impl SkipTimingProvider for AniSkipProvider {
    async fn fetch_segments(&self, episode: u32) -> AppResult<Option<Vec<TimedSegment>>> {
        let url = format!(
            "{}/v2/skip-times/{}/{}",
            self.base_url, self.series_id, episode
        );
        debug!("Fetching skip times from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("types", "op"),
                ("types", "ed"),
                ("types", "mixed-op"),
                ("types", "mixed-ed"),
                ("episodeLength", "0"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::SkipTiming(format!(
                "provider returned {status} for episode {episode}"
            )));
        }

        let body: SkipTimesResponse = response.json().await?;
        if !body.found {
            return Ok(None);
        }

        Ok(Some(
            body.results
                .into_iter()
                .map(|r| TimedSegment::new(r.skip_type, r.interval.start_time, r.interval.end_time))
                .collect(),
        ))
    }
}

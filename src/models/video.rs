use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::{AppError, AppResult};

/// Keys the backend mixes into its URL map that are not playable variants
const NON_PLAYABLE_KEYS: [&str; 2] = ["provider", "source"];

/// One named quality of a resolved video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityVariant {
    pub name: String,
    pub url: String,
}

/// Playable variants for one content item, in the order the backend
/// listed them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    pub variants: Vec<QualityVariant>,
    pub provider: Option<String>,
    pub cached: bool,
}

impl VideoSource {
    pub fn new(variants: Vec<QualityVariant>) -> Self {
        let variants = variants
            .into_iter()
            .filter(|v| !NON_PLAYABLE_KEYS.contains(&v.name.as_str()))
            .collect();
        Self {
            variants,
            provider: None,
            cached: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn qualities(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.name.as_str())
    }

    pub fn has_quality(&self, quality: &str) -> bool {
        self.variants.iter().any(|v| v.name == quality)
    }

    /// The first listed variant
    pub fn default_quality(&self) -> Option<&str> {
        self.variants.first().map(|v| v.name.as_str())
    }

    /// URL for `quality`, falling back to the `default` variant
    pub fn url_for(&self, quality: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.name == quality)
            .or_else(|| self.variants.iter().find(|v| v.name == "default"))
            .map(|v| v.url.as_str())
    }

    /// URL routed through the backend's byte proxy, which adds the headers
    /// the upstream host requires
    pub fn proxied_url(&self, backend_url: &str, quality: &str) -> AppResult<String> {
        let target = self.url_for(quality).ok_or_else(|| {
            AppError::ContentNotFound(format!("no '{quality}' variant in video source"))
        })?;
        proxy_url(backend_url, target)
    }
}

pub fn proxy_url(backend_url: &str, target: &str) -> AppResult<String> {
    let mut base = Url::parse(backend_url)
        .map_err(|e| AppError::Configuration(format!("invalid backend url '{backend_url}': {e}")))?;
    // Keep any path prefix the backend is mounted under
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let mut url = base
        .join("api/proxy/video")
        .map_err(|e| AppError::Configuration(e.to_string()))?;
    url.query_pairs_mut().append_pair("url", target);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(name: &str, url: &str) -> QualityVariant {
        QualityVariant {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_non_playable_keys_are_dropped() {
        let source = VideoSource::new(vec![
            variant("1080p", "https://cdn.example/ep1-1080.mp4"),
            variant("provider", "AllAnimeScraper"),
            variant("720p", "https://cdn.example/ep1-720.mp4"),
            variant("source", "allmanga"),
        ]);
        assert_eq!(source.qualities().collect::<Vec<_>>(), vec!["1080p", "720p"]);
        assert_eq!(source.default_quality(), Some("1080p"));
    }

    #[test]
    fn test_url_for_falls_back_to_default() {
        let source = VideoSource::new(vec![
            variant("default", "https://cdn.example/ep1.mp4"),
            variant("480p", "https://cdn.example/ep1-480.mp4"),
        ]);
        assert_eq!(source.url_for("480p"), Some("https://cdn.example/ep1-480.mp4"));
        assert_eq!(source.url_for("4k"), Some("https://cdn.example/ep1.mp4"));
        assert!(VideoSource::default().url_for("default").is_none());
    }

    #[test]
    fn test_proxied_url_encodes_target() {
        let source = VideoSource::new(vec![variant("default", "https://cdn.example/a b.mp4?sig=1&t=2")]);
        let proxied = source.proxied_url("http://localhost:8000", "default").unwrap();
        assert_eq!(
            proxied,
            "http://localhost:8000/api/proxy/video?url=https%3A%2F%2Fcdn.example%2Fa+b.mp4%3Fsig%3D1%26t%3D2"
        );
    }

    #[test]
    fn test_proxied_url_keeps_backend_path_prefix() {
        let target = "https://cdn.example/a.mp4";
        let expected = "http://host/viewer/api/proxy/video?url=https%3A%2F%2Fcdn.example%2Fa.mp4";
        assert_eq!(proxy_url("http://host/viewer", target).unwrap(), expected);
        assert_eq!(proxy_url("http://host/viewer/", target).unwrap(), expected);
    }

    #[test]
    fn test_proxied_url_rejects_bad_backend() {
        let source = VideoSource::new(vec![variant("default", "https://cdn.example/a.mp4")]);
        let err = source.proxied_url("not a url", "default").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}

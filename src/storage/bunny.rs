//! Bunny Storage uploads.

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::error::{Result, StorylineError};
use async_trait::async_trait;
use tracing::{info, instrument};
use url::Url;

const ROOT_DOMAIN: &str = ".bunnycdn.com";
const DEFAULT_HOST: &str = "storage.bunnycdn.com";

/// Turn a region hint (`ny`, `la.storage.bunnycdn.com`, `https://ny/`) into a storage host.
pub fn normalize_storage_host(region: &str) -> String {
    let cleaned = region.trim();
    let cleaned = cleaned
        .strip_prefix("https://")
        .or_else(|| cleaned.strip_prefix("http://"))
        .unwrap_or(cleaned)
        .trim_matches('/');

    if cleaned.is_empty() {
        return DEFAULT_HOST.to_string();
    }
    if cleaned.ends_with(ROOT_DOMAIN) {
        return cleaned.to_string();
    }
    format!("{cleaned}.{DEFAULT_HOST}")
}

/// Drop empty segments from a slash-separated object path.
pub fn normalize_object_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Uploads objects into one storage zone.
pub struct BunnyStorage {
    client: reqwest::Client,
    zone: String,
    access_key: String,
    base: String,
}

impl BunnyStorage {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let base = match &config.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}", normalize_storage_host(&config.region)),
        };
        Ok(Self {
            client,
            zone: config.zone.trim_matches('/').to_string(),
            access_key: config.access_key.clone(),
            base,
        })
    }

    fn object_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base).map_err(|e| {
            StorylineError::Configuration(format!("Invalid storage endpoint {}: {e}", self.base))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                StorylineError::Configuration(format!("Storage endpoint {} cannot hold a path", self.base))
            })?
            .pop_if_empty()
            .push(&self.zone)
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for BunnyStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, bytes: Vec<u8>, path: &str, content_type: &str) -> Result<String> {
        let segments = normalize_object_path(path);
        if segments.is_empty() {
            return Err(StorylineError::InvalidArgument(
                "object path must not be empty".to_string(),
            ));
        }

        let url = self.object_url(&segments)?;

        let response = self
            .client
            .put(url.clone())
            .header("AccessKey", &self.access_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorylineError::UpstreamUpload(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StorylineError::UpstreamUpload(format!("{status}: {text}")));
        }

        info!("Uploaded {}", url);
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(endpoint: Option<String>) -> StorageConfig {
        StorageConfig {
            region: "ny".to_string(),
            zone: "reels".to_string(),
            access_key: "secret".to_string(),
            prefix: "audio".to_string(),
            endpoint,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_region_code_gets_root_domain() {
        assert_eq!(normalize_storage_host("ny"), "ny.storage.bunnycdn.com");
        assert_eq!(normalize_storage_host(" https://la/ "), "la.storage.bunnycdn.com");
    }

    #[test]
    fn test_full_host_used_as_is() {
        assert_eq!(
            normalize_storage_host("http://uk.storage.bunnycdn.com/"),
            "uk.storage.bunnycdn.com"
        );
        assert_eq!(normalize_storage_host("storage.bunnycdn.com"), "storage.bunnycdn.com");
    }

    #[test]
    fn test_empty_region_uses_default_host() {
        assert_eq!(normalize_storage_host("  / "), "storage.bunnycdn.com");
    }

    #[test]
    fn test_public_url_from_region() {
        let storage = BunnyStorage::new(&config(None)).unwrap();
        let url = storage
            .object_url(&normalize_object_path("/audio//run_1/written_stories_audio.wav"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ny.storage.bunnycdn.com/reels/audio/run_1/written_stories_audio.wav"
        );
    }

    #[tokio::test]
    async fn test_upload_puts_with_access_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/reels/audio/run_1/written_stories_audio.wav")
            .match_header("accesskey", "secret")
            .match_header("content-type", "audio/wav")
            .match_body("WAVDATA")
            .with_status(201)
            .create_async()
            .await;

        let storage = BunnyStorage::new(&config(Some(server.url()))).unwrap();
        let url = storage
            .upload(b"WAVDATA".to_vec(), "audio/run_1/written_stories_audio.wav", "audio/wav")
            .await
            .unwrap();

        assert_eq!(url, format!("{}/reels/audio/run_1/written_stories_audio.wav", server.url()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_path_is_invalid_argument() {
        let storage = BunnyStorage::new(&config(None)).unwrap();
        let err = storage.upload(vec![1], "///", "audio/wav").await.unwrap_err();
        assert!(matches!(err, StorylineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_rejected_upload_is_upload_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", mockito::Matcher::Any)
            .with_status(401)
            .with_body("{\"HttpCode\":401,\"Message\":\"Unauthorized\"}")
            .create_async()
            .await;

        let storage = BunnyStorage::new(&config(Some(server.url()))).unwrap();
        let err = storage.upload(vec![1], "a.wav", "audio/wav").await.unwrap_err();

        assert!(matches!(err, StorylineError::UpstreamUpload(_)));
        assert!(err.to_string().contains("Unauthorized"));
    }
}

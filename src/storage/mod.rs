//! Object storage for finished audio reels.

mod bunny;

pub use bunny::{normalize_object_path, normalize_storage_host, BunnyStorage};

use crate::error::Result;
use async_trait::async_trait;

/// Content type used for uploaded reels unless a caller says otherwise.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/wav";

/// Remote object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path` and return the public URL.
    async fn upload(&self, bytes: Vec<u8>, path: &str, content_type: &str) -> Result<String>;
}

use crate::domain::model::{DownloadedMedia, MediaKind, VideoInfo};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Anything that can inspect and fetch media behind a link.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn probe(&self, url: &str) -> Result<VideoInfo>;

    /// Downloads into `dest_dir`, which the caller owns and cleans up.
    async fn download(&self, url: &str, kind: MediaKind, dest_dir: &Path) -> Result<DownloadedMedia>;
}

use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

const PROBE_FILE: &str = ".write_probe";

/// Scratch area for downloads. Every job gets its own directory which is
/// removed as soon as the file has been sent.
#[derive(Debug)]
pub struct TempStorage {
    root: PathBuf,
    stale_after: Duration,
    sequence: AtomicU64,
}

impl TempStorage {
    pub fn new(root: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            root: root.into(),
            stale_after,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root, checks it is writable and sweeps leftovers from a
    /// previous run. Returns how many stale entries were removed.
    pub async fn prepare(&self) -> Result<usize> {
        tokio::fs::create_dir_all(&self.root).await?;
        self.check_writable().await?;
        self.sweep_stale(SystemTime::now()).await
    }

    pub async fn check_writable(&self) -> Result<()> {
        let probe = self.root.join(PROBE_FILE);
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await?;
        Ok(())
    }

    pub async fn sweep_stale(&self, now: SystemTime) -> Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.stale_after {
                continue;
            }

            let path = entry.path();
            let outcome = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match outcome {
                Ok(()) => {
                    tracing::info!("🧹 Removed stale temp entry: {}", path.display());
                    removed += 1;
                }
                Err(e) => tracing::warn!("Could not remove stale entry {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }

    /// `<root>/<label>-<unix millis>-<seq>`
    pub async fn job_dir(&self, label: &str) -> Result<PathBuf> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Utc::now().timestamp_millis();
        let dir = self.root.join(format!("{}-{}-{}", label, stamp, seq));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Never fails: cleanup problems are only logged.
    pub async fn cleanup(&self, dir: &Path) {
        if !dir.starts_with(&self.root) {
            tracing::warn!("Refusing to delete {} outside of the temp root", dir.display());
            return;
        }
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => tracing::info!("🧹 Temp files removed: {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove {}: {}", dir.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_prepare_creates_missing_root() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("nested").join("temp_downloads");
        let storage = TempStorage::new(&root, Duration::from_secs(3600));

        assert_eq!(storage.prepare().await.unwrap(), 0);
        assert!(root.is_dir());
        assert!(!root.join(PROBE_FILE).exists());
    }

    #[tokio::test]
    async fn test_job_dirs_are_unique_and_cleaned() {
        let base = TempDir::new().unwrap();
        let storage = TempStorage::new(base.path(), Duration::from_secs(3600));

        let a = storage.job_dir("42").await.unwrap();
        let b = storage.job_dir("42").await.unwrap();
        assert_ne!(a, b);

        std::fs::write(a.join("video.mp4"), b"data").unwrap();
        storage.cleanup(&a).await;
        assert!(!a.exists());
        assert!(b.exists());

        // cleaning twice is harmless
        storage.cleanup(&a).await;
    }

    #[tokio::test]
    async fn test_sweep_only_removes_old_entries() {
        let base = TempDir::new().unwrap();
        let storage = TempStorage::new(base.path(), Duration::from_secs(60));
        std::fs::write(base.path().join("leftover.mp4"), b"data").unwrap();
        std::fs::create_dir(base.path().join("old-job")).unwrap();

        assert_eq!(storage.sweep_stale(SystemTime::now()).await.unwrap(), 0);

        let later = SystemTime::now() + Duration::from_secs(120);
        assert_eq!(storage.sweep_stale(later).await.unwrap(), 2);
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_ignores_paths_outside_root() {
        let base = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let storage = TempStorage::new(base.path(), Duration::from_secs(60));

        storage.cleanup(other.path()).await;
        assert!(other.path().exists());
    }
}

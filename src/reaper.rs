//! Deferred deletion of scratch artifacts
//!
//! Every delivered artifact is registered with an expiry. A periodic sweep
//! deletes what has expired; until then the registry doubles as the lookup
//! table for the download endpoint. Deletion is best-effort: a file that is
//! already gone is skipped silently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;
use crate::scratch::{ArtifactId, ScratchArtifact, ScratchDir};

#[derive(Debug, Clone)]
pub struct PendingArtifact {
    pub artifact: ScratchArtifact,
    pub expires_at: Instant,
}

impl PendingArtifact {
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

#[derive(Clone)]
pub struct ArtifactRegistry {
    entries: Arc<Mutex<HashMap<ArtifactId, PendingArtifact>>>,
    metrics: Arc<Metrics>,
}

impl ArtifactRegistry {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            metrics,
        }
    }

    /// Schedule `artifact` for deletion `ttl` from now.
    pub async fn register(&self, artifact: ScratchArtifact, ttl: Duration) -> PendingArtifact {
        let pending = PendingArtifact {
            artifact,
            expires_at: Instant::now() + ttl,
        };
        debug!("artifact {} expires in {:?}", pending.artifact.id, ttl);
        self.entries
            .lock()
            .await
            .insert(pending.artifact.id, pending.clone());
        pending
    }

    /// Live (not yet expired) entry for `id`.
    pub async fn get(&self, id: ArtifactId) -> Option<PendingArtifact> {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .get(&id)
            .filter(|pending| pending.expires_at > now)
            .cloned()
    }

    /// Drop the deletion timer; the file is left in place.
    pub async fn cancel(&self, id: ArtifactId) -> Option<PendingArtifact> {
        self.entries.lock().await.remove(&id)
    }

    pub async fn pending(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Remove every entry expired at `now` and delete its files.
    /// Returns the ids that were reaped.
    pub async fn sweep_at(&self, now: Instant) -> Vec<ArtifactId> {
        let expired: Vec<PendingArtifact> = {
            let mut entries = self.entries.lock().await;
            let ids: Vec<ArtifactId> = entries
                .iter()
                .filter(|(_, pending)| pending.expires_at <= now)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };

        let mut reaped = Vec::with_capacity(expired.len());
        for pending in expired {
            remove_artifact_files(&pending.artifact).await;
            self.metrics.record_reaped();
            reaped.push(pending.artifact.id);
        }
        reaped
    }

    pub async fn sweep(&self) -> Vec<ArtifactId> {
        self.sweep_at(Instant::now()).await
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the handle is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reaped = registry.sweep().await;
                if !reaped.is_empty() {
                    info!("reaped {} expired artifacts", reaped.len());
                }
            }
        })
    }
}

/// Delete the artifact and any downloader leftovers sharing its id.
async fn remove_artifact_files(artifact: &ScratchArtifact) {
    let Some(root) = artifact.path.parent() else {
        return;
    };
    match ScratchDir::new(root).purge(artifact.id).await {
        Ok(0) => {}
        Ok(removed) => info!("Deleted file: {} ({} removed)", artifact.path.display(), removed),
        Err(e) => warn!("could not delete {}: {}", artifact.path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::MediaFormat;
    use crate::scratch::ScratchDir;
    use tempfile::TempDir;

    fn registry() -> ArtifactRegistry {
        ArtifactRegistry::new(Metrics::new())
    }

    #[tokio::test]
    async fn test_sweep_deletes_expired_file() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchDir::new(dir.path());
        let artifact = scratch.allocate("clip", "", MediaFormat::Video);
        std::fs::write(&artifact.path, b"video").unwrap();

        let registry = registry();
        let pending = registry.register(artifact.clone(), Duration::from_secs(180)).await;
        assert!(registry.get(artifact.id).await.is_some());

        // Not yet due.
        assert!(registry.sweep().await.is_empty());
        assert!(artifact.path.exists());

        let reaped = registry.sweep_at(pending.expires_at).await;
        assert_eq!(reaped, vec![artifact.id]);
        assert!(!artifact.path.exists());
        assert!(registry.get(artifact.id).await.is_none());
        assert_eq!(registry.pending().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_downloader_leftovers() {
        let dir = TempDir::new().unwrap();
        let scratch = ScratchDir::new(dir.path());
        let artifact = scratch.allocate("clip", "", MediaFormat::Video);
        let neighbour = scratch.allocate("other", "", MediaFormat::Video);
        std::fs::write(&artifact.path, b"video").unwrap();
        std::fs::write(dir.path().join(format!("{}.f137.mp4", artifact.id)), b"v").unwrap();
        std::fs::write(dir.path().join(format!("{}.mp4.part", artifact.id)), b"p").unwrap();
        std::fs::write(&neighbour.path, b"video").unwrap();

        let registry = registry();
        registry.register(artifact.clone(), Duration::ZERO).await;
        assert_eq!(registry.sweep().await, vec![artifact.id]);

        let left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(left, vec![neighbour.path]);
    }

    #[tokio::test]
    async fn test_sweep_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let artifact = ScratchDir::new(dir.path()).allocate("gone", "", MediaFormat::Audio);

        let registry = registry();
        registry.register(artifact.clone(), Duration::ZERO).await;
        assert_eq!(registry.sweep().await, vec![artifact.id]);
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_served() {
        let registry = registry();
        let artifact = ScratchDir::new("/tmp").allocate("x", "", MediaFormat::Video);
        registry.register(artifact.clone(), Duration::ZERO).await;

        assert!(registry.get(artifact.id).await.is_none());
        assert_eq!(registry.pending().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_keeps_file() {
        let dir = TempDir::new().unwrap();
        let artifact = ScratchDir::new(dir.path()).allocate("keep", "", MediaFormat::Video);
        std::fs::write(&artifact.path, b"video").unwrap();

        let registry = registry();
        registry.register(artifact.clone(), Duration::ZERO).await;
        assert!(registry.cancel(artifact.id).await.is_some());
        assert!(registry.sweep().await.is_empty());
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn test_sweeper_task_reaps() {
        let dir = TempDir::new().unwrap();
        let artifact = ScratchDir::new(dir.path()).allocate("bg", "", MediaFormat::Video);
        std::fs::write(&artifact.path, b"video").unwrap();

        let registry = registry();
        registry.register(artifact.clone(), Duration::from_millis(20)).await;
        let handle = registry.spawn_sweeper(Duration::from_millis(10));

        for _ in 0..100 {
            if !artifact.path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(!artifact.path.exists());
        assert_eq!(registry.pending().await, 0);
    }
}

//! Job identity, lifecycle events, cancellation and the running-job registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tokio::sync::Notify;

use crate::blur::DroppedRegion;
use crate::error::{Result, TimelapseError, TranscodeFailure};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        JobId(nanoid::nanoid!(10))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Starting,
    Probing,
    Encoding,
    Finalizing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Starting => write!(f, "starting"),
            Stage::Probing => write!(f, "probing"),
            Stage::Encoding => write!(f, "encoding"),
            Stage::Finalizing => write!(f, "finalizing"),
        }
    }
}

/// Everything a caller observes about a job. `Completed` or `Failed` is always last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum JobEvent {
    Progress { percent: u8, stage: Stage },
    /// Sent once before encoding when any blur region was left out.
    /// `none_valid` means the job continues without blur.
    #[serde(rename = "regions_dropped")]
    RegionsDropped {
        dropped: Vec<DroppedRegion>,
        none_valid: bool,
    },
    Completed { output_path: PathBuf },
    Failed(TranscodeFailure),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. } | JobEvent::Failed(_))
    }
}

/// Cancellation flag shared between a job and whoever may cancel it
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call from a signal handler thread
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    by_id: HashMap<JobId, (PathBuf, CancelToken)>,
    by_source: HashMap<PathBuf, JobId>,
}

/// Jobs currently in flight, at most one per source file
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `source` for `id`. The claim is released when the guard drops.
    pub fn register(&self, id: &JobId, source: &Path, token: CancelToken) -> Result<JobGuard> {
        let key = source_key(source);
        let mut state = self.lock();

        if let Some(existing) = state.by_source.get(&key) {
            return Err(TimelapseError::JobAlreadyRunning {
                path: source.to_path_buf(),
                job_id: existing.to_string(),
            });
        }

        state.by_source.insert(key.clone(), id.clone());
        state.by_id.insert(id.clone(), (key, token));

        Ok(JobGuard {
            registry: self.clone(),
            id: id.clone(),
        })
    }

    /// Signal the job to stop. Returns false when no such job is running.
    pub fn cancel(&self, id: &JobId) -> bool {
        let state = self.lock();
        match state.by_id.get(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let state = self.lock();
        for (_, token) in state.by_id.values() {
            token.cancel();
        }
    }

    pub fn is_running(&self, id: &JobId) -> bool {
        self.lock().by_id.contains_key(id)
    }

    pub fn running(&self) -> Vec<JobId> {
        self.lock().by_id.keys().cloned().collect()
    }

    fn release(&self, id: &JobId) {
        let mut state = self.lock();
        if let Some((key, _)) = state.by_id.remove(id) {
            state.by_source.remove(&key);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // A panic while holding the lock leaves plain maps behind, still usable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn source_key(source: &Path) -> PathBuf {
    std::fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf())
}

/// Registry claim held for the lifetime of a job
#[derive(Debug)]
pub struct JobGuard {
    registry: JobRegistry,
    id: JobId,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_second_job_for_same_source_is_rejected() {
        let registry = JobRegistry::new();
        let first = JobId::from("first");
        let _guard = registry
            .register(&first, Path::new("/captures/a.webm"), CancelToken::new())
            .unwrap();

        let err = registry
            .register(&JobId::from("second"), Path::new("/captures/a.webm"), CancelToken::new())
            .unwrap_err();
        match err {
            TimelapseError::JobAlreadyRunning { job_id, .. } => assert_eq!(job_id, "first"),
            other => panic!("unexpected error: {other}"),
        }

        // Other sources are independent
        assert!(registry
            .register(&JobId::from("third"), Path::new("/captures/b.webm"), CancelToken::new())
            .is_ok());
    }

    #[test]
    fn test_guard_releases_source() {
        let registry = JobRegistry::new();
        let id = JobId::from("job");
        let guard = registry
            .register(&id, Path::new("/captures/a.webm"), CancelToken::new())
            .unwrap();
        assert!(registry.is_running(&id));

        drop(guard);
        assert!(!registry.is_running(&id));
        assert!(registry
            .register(&JobId::from("again"), Path::new("/captures/a.webm"), CancelToken::new())
            .is_ok());
    }

    #[test]
    fn test_cancel_reaches_token() {
        let registry = JobRegistry::new();
        let id = JobId::from("job");
        let token = CancelToken::new();
        let _guard = registry
            .register(&id, Path::new("/captures/a.webm"), token.clone())
            .unwrap();

        assert!(registry.cancel(&id));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(&JobId::from("missing")));
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn test_event_json_shape() {
        let event = JobEvent::Progress {
            percent: 40,
            stage: Stage::Encoding,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"progress","percent":40,"stage":"encoding"}"#
        );
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_regions_dropped_json_shape() {
        use crate::blur::DropReason;
        use crate::domain::VideoRect;

        let event = JobEvent::RegionsDropped {
            dropped: vec![DroppedRegion {
                index: 3,
                reason: DropReason::OverCap,
                rect: VideoRect {
                    index: 3,
                    x: 0,
                    y: 0,
                    width: 20,
                    height: 20,
                },
            }],
            none_valid: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "regions_dropped");
        assert_eq!(json["dropped"][0]["reason"], "OverCap");
        assert_eq!(json["none_valid"], false);
        assert!(!event.is_terminal());

        let back: JobEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::paths::write_atomic;

/// Process-wide kill switch (spec §4.10). Every yield point in the Agent
/// Runtime's loop — before an LLM call, before a tool call, between
/// iterations — checks `is_stopped()`; the `CancellationToken` additionally
/// lets anything awaiting I/O wake up immediately instead of waiting for its
/// own timeout.
#[derive(Clone)]
pub struct EmergencyStop {
    token: CancellationToken,
    tripped: Arc<AtomicBool>,
    sentinel_path: PathBuf,
}

impl EmergencyStop {
    pub fn new(sentinel_path: PathBuf) -> Self {
        let tripped = Arc::new(AtomicBool::new(sentinel_path.exists()));
        let stop = Self {
            token: CancellationToken::new(),
            tripped,
            sentinel_path,
        };
        if stop.tripped.load(Ordering::SeqCst) {
            stop.token.cancel();
        }
        stop
    }

    /// Trips the stop in-process and writes the sentinel file so a
    /// concurrently running process (or a restart) also observes it.
    pub fn activate(&self, reason: &str) {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            warn!(reason, "emergency stop activated");
            self.token.cancel();
            if let Err(err) = write_atomic(&self.sentinel_path, reason.as_bytes()) {
                warn!(%err, "failed to persist emergency stop sentinel");
            }
        }
    }

    /// Clears the in-process flag and deletes the sentinel file. Does not
    /// un-cancel the `CancellationToken` — tokens are one-shot by design, so
    /// `reset` is only meaningful before the next task starts a fresh token.
    pub fn reset(&mut self) {
        self.tripped.store(false, Ordering::SeqCst);
        let _ = std::fs::remove_file(&self.sentinel_path);
        self.token = CancellationToken::new();
    }

    pub fn is_stopped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst) || self.sentinel_path.exists()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Awaits cancellation without polling; used where the runtime is
    /// already inside a `tokio::select!` against an in-flight tool call.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_persists_sentinel_and_trips_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".emergency_stop");
        let estop = EmergencyStop::new(path.clone());
        assert!(!estop.is_stopped());
        estop.activate("operator request");
        assert!(estop.is_stopped());
        assert!(path.exists());
    }

    #[test]
    fn new_observes_preexisting_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".emergency_stop");
        std::fs::write(&path, b"stale").unwrap();
        let estop = EmergencyStop::new(path);
        assert!(estop.is_stopped());
    }

    #[test]
    fn reset_clears_flag_and_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".emergency_stop");
        let mut estop = EmergencyStop::new(path.clone());
        estop.activate("test");
        estop.reset();
        assert!(!estop.is_stopped());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_activate() {
        let dir = tempfile::tempdir().unwrap();
        let estop = EmergencyStop::new(dir.path().join(".emergency_stop"));
        let watcher = estop.clone();
        let handle = tokio::spawn(async move {
            watcher.cancelled().await;
        });
        estop.activate("shutdown");
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("cancellation should be observed promptly")
            .unwrap();
    }
}

//! Three-state transaction status shown to a user.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// `Idle → Pending → {Success, Error} → Idle`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Idle,
    Pending { action: String },
    Success { message: String },
    Error { message: String },
}

struct StatusInner {
    status: TxStatus,
    /// Bumped on every new action so stale resets are ignored.
    generation: u64,
}

/// Tracks the status of the latest user action. Success and error return to
/// idle after the display window.
#[derive(Clone)]
pub struct StatusTracker {
    inner: Arc<Mutex<StatusInner>>,
    window: Duration,
}

impl StatusTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatusInner {
                status: TxStatus::Idle,
                generation: 0,
            })),
            window,
        }
    }

    pub fn current(&self) -> TxStatus {
        self.lock().status.clone()
    }

    /// Enter `Pending` for a new action and return its generation.
    pub fn begin(&self, action: &str) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.status = TxStatus::Pending {
            action: action.to_string(),
        };
        inner.generation
    }

    pub fn succeed(&self, generation: u64, message: String) {
        self.finish(generation, TxStatus::Success { message });
    }

    pub fn fail(&self, generation: u64, message: String) {
        self.finish(generation, TxStatus::Error { message });
    }

    /// Must be called from within a tokio runtime.
    fn finish(&self, generation: u64, status: TxStatus) {
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            inner.status = status;
        }

        let inner = self.inner.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.generation == generation {
                inner.status = TxStatus::Idle;
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_to_idle_after_window() {
        let tracker = StatusTracker::new(Duration::from_millis(500));
        assert_eq!(tracker.current(), TxStatus::Idle);

        let generation = tracker.begin("submit");
        assert!(matches!(tracker.current(), TxStatus::Pending { .. }));

        tracker.succeed(generation, "done".to_string());
        assert!(matches!(tracker.current(), TxStatus::Success { .. }));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(tracker.current(), TxStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reset_does_not_clobber_newer_action() {
        let tracker = StatusTracker::new(Duration::from_millis(500));

        let first = tracker.begin("submit");
        tracker.fail(first, "boom".to_string());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let second = tracker.begin("request");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(tracker.current(), TxStatus::Pending { .. }));

        // Finishing an old generation is ignored
        tracker.succeed(first, "late".to_string());
        assert!(matches!(tracker.current(), TxStatus::Pending { .. }));

        tracker.succeed(second, "ok".to_string());
        assert!(matches!(tracker.current(), TxStatus::Success { .. }));
    }
}

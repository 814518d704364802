//! Per-request completion futures.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;

use super::RequestId;
use super::records::PsiResult;

/// Terminal outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed(PsiResult),
    Failed { reason: String },
}

/// Waiters keyed by request id. The acceptor resolves each request once.
#[derive(Clone, Default)]
pub struct CompletionHub {
    waiters: Arc<DashMap<RequestId, Vec<oneshot::Sender<RequestOutcome>>>>,
}

impl CompletionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, request_id: RequestId) -> oneshot::Receiver<RequestOutcome> {
        let (tx, rx) = oneshot::channel();
        self.waiters.entry(request_id).or_default().push(tx);
        rx
    }

    /// Wake every waiter of `request_id`. Returns how many were woken.
    pub fn resolve(&self, request_id: &RequestId, outcome: RequestOutcome) -> usize {
        let Some((_, senders)) = self.waiters.remove(request_id) else {
            return 0;
        };
        senders
            .into_iter()
            .map(|tx| tx.send(outcome.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }

    /// Drop waiters whose receiver is gone, and the entry once it is empty.
    pub fn prune(&self, request_id: &RequestId) {
        if let Some(mut senders) = self.waiters.get_mut(request_id) {
            senders.retain(|tx| !tx.is_closed());
        }
        self.waiters
            .remove_if(request_id, |_, senders| senders.is_empty());
    }

    /// Requests with at least one registered waiter.
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_wakes_all_waiters_once() {
        let hub = CompletionHub::new();
        let id = RequestId([4u8; 32]);

        let first = hub.subscribe(id);
        let second = hub.subscribe(id);
        assert_eq!(hub.waiting(), 1);

        let outcome = RequestOutcome::Failed {
            reason: "aborted".to_string(),
        };
        assert_eq!(hub.resolve(&id, outcome.clone()), 2);
        assert_eq!(first.await.unwrap(), outcome);
        assert_eq!(second.await.unwrap(), outcome);

        // Already drained
        assert_eq!(hub.resolve(&id, outcome), 0);
        assert_eq!(hub.waiting(), 0);
    }

    #[test]
    fn test_prune_keeps_live_waiters() {
        let hub = CompletionHub::new();
        let id = RequestId([5u8; 32]);

        let live = hub.subscribe(id);
        drop(hub.subscribe(id));
        hub.prune(&id);
        assert_eq!(hub.waiting(), 1);

        drop(live);
        hub.prune(&id);
        assert_eq!(hub.waiting(), 0);
    }
}

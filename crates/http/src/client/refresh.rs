//! Session refresh coordination
//!
//! A [`RefreshCoordinator`] owns the refresh-in-progress flag and the queue of
//! requests waiting for the refresh to resolve. The first request that sees a
//! 401 becomes the leader and performs the refresh; every other request is
//! parked on a one-shot channel and released in arrival order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

/// How a refresh cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New credentials were stored
    Refreshed,
    /// The session was terminated and credentials cleared
    Failed,
    /// The leader went away without reporting a result
    Abandoned,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    refreshing: bool,
    generation: u64,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Serializes session refreshes for one client
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<CoordinatorState>,
}

/// Result of asking the coordinator to refresh
#[derive(Debug)]
pub enum Turn {
    /// Caller must refresh and then call [`RefreshLease::finish`]
    Lead(RefreshLease),
    /// A refresh is already running; await the queued handle
    Wait(QueuedRequest),
    /// Credentials were renewed after the caller's attempt was dispatched
    Stale,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of successful refreshes so far
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Number of requests parked behind the current refresh
    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Wait for an in-progress refresh to resolve
    ///
    /// Returns `None` immediately when no refresh is running.
    pub async fn wait_idle(&self) -> Option<RefreshOutcome> {
        let queued = {
            let mut state = self.lock();
            if !state.refreshing {
                return None;
            }
            enqueue(&mut state)
        };
        Some(queued.outcome().await)
    }

    /// Claim the refresh for a request that saw a 401
    ///
    /// `observed_generation` is the generation read when the failed attempt
    /// was dispatched.
    pub fn begin(self: &Arc<Self>, observed_generation: u64) -> Turn {
        let mut state = self.lock();

        if state.refreshing {
            return Turn::Wait(enqueue(&mut state));
        }
        if state.generation != observed_generation {
            return Turn::Stale;
        }

        state.refreshing = true;
        Turn::Lead(RefreshLease {
            coordinator: Arc::clone(self),
            finished: false,
        })
    }

    fn release(&self, outcome: RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            if outcome == RefreshOutcome::Refreshed {
                state.generation += 1;
            }
            std::mem::take(&mut state.waiters)
        };

        let released = waiters.len();
        for waiter in waiters {
            // Receiver gone means the waiting request was dropped
            let _ = waiter.send(outcome);
        }
        debug!(?outcome, released, "Refresh resolved");
        released
    }
}

fn enqueue(state: &mut CoordinatorState) -> QueuedRequest {
    let (tx, rx) = oneshot::channel();
    state.waiters.push_back(tx);
    QueuedRequest { rx }
}

/// Exclusive right to perform the current refresh
///
/// Dropping the lease without calling [`finish`](Self::finish) releases the
/// queue with [`RefreshOutcome::Abandoned`].
#[derive(Debug)]
pub struct RefreshLease {
    coordinator: Arc<RefreshCoordinator>,
    finished: bool,
}

impl RefreshLease {
    /// Clear the flag and release queued requests in FIFO order
    ///
    /// Returns how many requests were released.
    pub fn finish(mut self, outcome: RefreshOutcome) -> usize {
        self.finished = true;
        self.coordinator.release(outcome)
    }
}

impl Drop for RefreshLease {
    fn drop(&mut self) {
        if !self.finished {
            self.coordinator.release(RefreshOutcome::Abandoned);
        }
    }
}

/// Handle for a request parked behind a running refresh
#[derive(Debug)]
pub struct QueuedRequest {
    rx: oneshot::Receiver<RefreshOutcome>,
}

impl QueuedRequest {
    pub async fn outcome(self) -> RefreshOutcome {
        self.rx.await.unwrap_or(RefreshOutcome::Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(coordinator: &Arc<RefreshCoordinator>) -> RefreshLease {
        match coordinator.begin(coordinator.generation()) {
            Turn::Lead(lease) => lease,
            other => panic!("expected to lead, got {other:?}"),
        }
    }

    fn wait(coordinator: &Arc<RefreshCoordinator>) -> QueuedRequest {
        match coordinator.begin(0) {
            Turn::Wait(queued) => queued,
            other => panic!("expected to wait, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_first_caller_leads() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let lease = lead(&coordinator);
        assert!(coordinator.is_refreshing());

        let queued = wait(&coordinator);
        assert_eq!(coordinator.queued(), 1);

        assert_eq!(lease.finish(RefreshOutcome::Refreshed), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(queued.outcome().await, RefreshOutcome::Refreshed);
    }

    #[tokio::test]
    async fn test_waiters_released_in_arrival_order() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let lease = lead(&coordinator);
        let order = Arc::new(Mutex::new(Vec::new()));

        let queued: Vec<_> = (1..=3).map(|id| (id, wait(&coordinator))).collect();

        // Spawn in reverse so the release order, not the spawn order, decides
        let mut handles = Vec::new();
        for (id, handle) in queued.into_iter().rev() {
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                handle.outcome().await;
                order.lock().unwrap().push(id);
            }));
        }
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        lease.finish(RefreshOutcome::Refreshed);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_reported_to_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let lease = lead(&coordinator);
        let first = wait(&coordinator);
        let second = wait(&coordinator);

        lease.finish(RefreshOutcome::Failed);

        assert_eq!(first.outcome().await, RefreshOutcome::Failed);
        assert_eq!(second.outcome().await, RefreshOutcome::Failed);
        assert_eq!(coordinator.generation(), 0);
    }

    #[test]
    fn test_stale_attempt_does_not_lead() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let observed = coordinator.generation();

        lead(&coordinator).finish(RefreshOutcome::Refreshed);
        assert_eq!(coordinator.generation(), observed + 1);

        assert!(matches!(coordinator.begin(observed), Turn::Stale));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_dropped_lease_releases_queue() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let lease = lead(&coordinator);
        let queued = wait(&coordinator);

        drop(lease);

        assert!(!coordinator.is_refreshing());
        assert_eq!(queued.outcome().await, RefreshOutcome::Abandoned);
    }

    #[tokio::test]
    async fn test_wait_idle() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        assert_eq!(coordinator.wait_idle().await, None);

        let lease = lead(&coordinator);
        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.wait_idle().await })
        };
        while coordinator.queued() == 0 {
            tokio::task::yield_now().await;
        }

        lease.finish(RefreshOutcome::Refreshed);
        assert_eq!(waiter.await.unwrap(), Some(RefreshOutcome::Refreshed));
    }
}

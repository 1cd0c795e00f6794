//! Single-flight coordination of token refresh episodes
//!
//! When a protected call comes back 401, the caller asks the coordinator what
//! to do. The first caller to find it [`RefreshState::Idle`] becomes the
//! episode leader and performs the one refresh call. Everyone arriving while
//! the episode runs is queued in arrival order and suspended until the leader
//! resolves the episode, at which point the queue is drained front to back.
//!
//! The state lives behind a mutex that is never held across an `.await`, so
//! the `Idle -> Refreshing` check-and-set is a single atomic step.

use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use crate::error::RefreshError;

/// New access token on success, the shared refresh error otherwise
pub type EpisodeOutcome = Result<SecretString, RefreshError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

struct Waiter {
    ticket: u64,
    tx: oneshot::Sender<EpisodeOutcome>,
}

struct Inner {
    state: RefreshState,
    episode: u64,
    next_ticket: u64,
    waiters: VecDeque<Waiter>,
}

/// Per-client refresh coordinator. Clones share the same state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Mutex<Inner>>,
}

/// Role handed out by [`RefreshCoordinator::acquire_or_enqueue`]
pub enum Acquired {
    /// Caller must perform the refresh and resolve the episode
    Leader(EpisodeLeader),
    /// Caller must wait for the running episode to resolve
    Waiter(EpisodeWaiter),
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: RefreshState::Idle,
                episode: 0,
                next_ticket: 0,
                waiters: VecDeque::new(),
            })),
        }
    }

    pub fn state(&self) -> RefreshState {
        self.lock().state
    }

    /// Number of callers currently queued on the running episode
    pub fn pending_waiters(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Start an episode, or join the one already running.
    pub fn acquire_or_enqueue(&self) -> Acquired {
        let mut inner = self.lock();
        match inner.state {
            RefreshState::Idle => {
                inner.state = RefreshState::Refreshing;
                inner.episode += 1;
                Acquired::Leader(EpisodeLeader {
                    coordinator: self.clone(),
                    episode: inner.episode,
                    resolved: false,
                })
            }
            RefreshState::Refreshing => {
                let ticket = inner.next_ticket;
                inner.next_ticket += 1;
                let (tx, rx) = oneshot::channel();
                inner.waiters.push_back(Waiter { ticket, tx });
                Acquired::Waiter(EpisodeWaiter {
                    coordinator: self.clone(),
                    episode: inner.episode,
                    ticket,
                    rx,
                })
            }
        }
    }

    /// End the running episode and release every queued waiter, oldest
    /// first, with `outcome`. Returns how many waiters were released.
    fn resolve_episode(&self, outcome: EpisodeOutcome) -> usize {
        let waiters = {
            let mut inner = self.lock();
            inner.state = RefreshState::Idle;
            std::mem::take(&mut inner.waiters)
        };

        let mut released = 0;
        for waiter in waiters {
            // a waiter whose caller went away between dequeue and send is skipped
            if waiter.tx.send(outcome.clone()).is_ok() {
                released += 1;
            }
        }
        released
    }

    fn cancel_waiter(&self, ticket: u64) {
        let mut inner = self.lock();
        if let Some(position) = inner.waiters.iter().position(|w| w.ticket == ticket) {
            inner.waiters.remove(position);
            tracing::debug!(ticket, "queued refresh waiter cancelled");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to perform the refresh call for one episode.
///
/// Dropping it without calling [`EpisodeLeader::resolve`] rejects every
/// queued waiter with [`RefreshError::Abandoned`] and returns the coordinator
/// to idle, so a cancelled leader never strands the queue.
pub struct EpisodeLeader {
    coordinator: RefreshCoordinator,
    episode: u64,
    resolved: bool,
}

impl EpisodeLeader {
    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Finish the episode. Returns how many waiters were released.
    pub fn resolve(mut self, outcome: EpisodeOutcome) -> usize {
        self.resolved = true;
        self.coordinator.resolve_episode(outcome)
    }
}

impl Drop for EpisodeLeader {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!(episode = self.episode, "refresh leader dropped mid-episode");
            self.coordinator
                .resolve_episode(Err(RefreshError::Abandoned));
        }
    }
}

/// A queued caller. Dropping it before the episode resolves removes it from
/// the queue without disturbing the others.
pub struct EpisodeWaiter {
    coordinator: RefreshCoordinator,
    episode: u64,
    ticket: u64,
    rx: oneshot::Receiver<EpisodeOutcome>,
}

impl EpisodeWaiter {
    pub fn episode(&self) -> u64 {
        self.episode
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Suspend until the episode resolves
    pub async fn wait(mut self) -> EpisodeOutcome {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RefreshError::Abandoned),
        }
    }
}

impl Drop for EpisodeWaiter {
    fn drop(&mut self) {
        self.coordinator.cancel_waiter(self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::Mutex as StdMutex;

    fn leader(acquired: Acquired) -> EpisodeLeader {
        match acquired {
            Acquired::Leader(leader) => leader,
            Acquired::Waiter(_) => panic!("expected to lead the episode"),
        }
    }

    fn waiter(acquired: Acquired) -> EpisodeWaiter {
        match acquired {
            Acquired::Waiter(waiter) => waiter,
            Acquired::Leader(_) => panic!("expected to join the running episode"),
        }
    }

    fn token(value: &str) -> EpisodeOutcome {
        Ok(SecretString::from(value.to_string()))
    }

    #[test]
    fn test_first_caller_leads_and_others_queue() {
        let coordinator = RefreshCoordinator::new();
        assert_eq!(coordinator.state(), RefreshState::Idle);

        let lead = leader(coordinator.acquire_or_enqueue());
        assert_eq!(coordinator.state(), RefreshState::Refreshing);

        let first = waiter(coordinator.acquire_or_enqueue());
        let second = waiter(coordinator.acquire_or_enqueue());
        assert_eq!(coordinator.pending_waiters(), 2);
        assert_eq!(first.episode(), lead.episode());
        assert!(first.ticket() < second.ticket());

        assert_eq!(lead.resolve(token("tok2")), 2);
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(coordinator.pending_waiters(), 0);
    }

    #[tokio::test]
    async fn test_waiters_receive_the_outcome() {
        let coordinator = RefreshCoordinator::new();
        let lead = leader(coordinator.acquire_or_enqueue());
        let queued = waiter(coordinator.acquire_or_enqueue());

        lead.resolve(token("tok2"));

        let outcome = queued.wait().await.unwrap();
        assert_eq!(outcome.expose_secret(), "tok2");
    }

    #[tokio::test]
    async fn test_failure_is_shared_by_every_waiter() {
        let coordinator = RefreshCoordinator::new();
        let lead = leader(coordinator.acquire_or_enqueue());
        let a = waiter(coordinator.acquire_or_enqueue());
        let b = waiter(coordinator.acquire_or_enqueue());

        lead.resolve(Err(RefreshError::Timeout));

        assert_eq!(a.wait().await.unwrap_err(), RefreshError::Timeout);
        assert_eq!(b.wait().await.unwrap_err(), RefreshError::Timeout);
    }

    #[tokio::test]
    async fn test_waiters_wake_in_arrival_order() {
        let coordinator = RefreshCoordinator::new();
        let lead = leader(coordinator.acquire_or_enqueue());
        let order = Arc::new(StdMutex::new(Vec::new()));

        let mut handles = Vec::new();
        for name in ["a", "b", "c"] {
            let queued = waiter(coordinator.acquire_or_enqueue());
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                queued.wait().await.unwrap();
                order.lock().unwrap().push(name);
            }));
        }

        // let every task park on its receiver
        tokio::task::yield_now().await;
        lead.resolve(token("tok2"));

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_dropped_waiter_leaves_queue_intact() {
        let coordinator = RefreshCoordinator::new();
        let lead = leader(coordinator.acquire_or_enqueue());
        let a = waiter(coordinator.acquire_or_enqueue());
        let b = waiter(coordinator.acquire_or_enqueue());
        let c = waiter(coordinator.acquire_or_enqueue());
        assert_eq!(coordinator.pending_waiters(), 3);

        drop(b);
        assert_eq!(coordinator.pending_waiters(), 2);

        assert_eq!(lead.resolve(token("tok2")), 2);
        assert!(a.wait().await.is_ok());
        assert!(c.wait().await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_leader_abandons_episode() {
        let coordinator = RefreshCoordinator::new();
        let lead = leader(coordinator.acquire_or_enqueue());
        let queued = waiter(coordinator.acquire_or_enqueue());

        drop(lead);

        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(queued.wait().await.unwrap_err(), RefreshError::Abandoned);
    }

    #[test]
    fn test_next_episode_starts_fresh() {
        let coordinator = RefreshCoordinator::new();
        let first = leader(coordinator.acquire_or_enqueue());
        let first_episode = first.episode();
        first.resolve(token("tok2"));

        let second = leader(coordinator.acquire_or_enqueue());
        assert_eq!(second.episode(), first_episode + 1);
        second.resolve(Err(RefreshError::MissingRefreshToken));
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }

    #[test]
    fn test_clones_share_state() {
        let coordinator = RefreshCoordinator::new();
        let clone = coordinator.clone();

        let _lead = leader(coordinator.acquire_or_enqueue());
        assert_eq!(clone.state(), RefreshState::Refreshing);
        let _queued = waiter(clone.acquire_or_enqueue());
        assert_eq!(coordinator.pending_waiters(), 1);
    }
}

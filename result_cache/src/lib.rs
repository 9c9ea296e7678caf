//! Server-side cache of in-flight query results.
//!
//! A long-running graph query is registered here under a [`RequestId`] before it
//! starts. The task running the query calls [`ResultCache::complete`] when it
//! finishes, while HTTP handlers call [`ResultCache::poll`] to fetch the result.
//!
//! # Lifecycle of an entry
//!
//! 1. `register` creates an empty entry owned by the caller and hands back its
//!    id. Only the owner can poll it; to anyone else the id does not exist.
//! 2. `complete` stores the result exactly once and wakes every poller that is
//!    currently waiting on the entry. A stored result is never overwritten.
//! 3. `poll` waits up to a bounded duration for the result. A completed entry is
//!    removed atomically by the first poller that observes it, so a result is
//!    handed out exactly once; any other concurrent poller sees `NotFound`.
//! 4. Entries nobody comes back for are dropped by `evict_expired`, which the
//!    server runs periodically through `spawn_sweeper`.

use dashmap::DashMap;
use log::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};

/// Identifier handed to the client for a dispatched query.
pub type RequestId = u64;

/// What a poller gets back for a request id.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// The id was never registered, belongs to another owner, was already
    /// consumed, or was evicted.
    NotFound,
    /// The query is still running; poll again with the same id.
    Pending(RequestId),
    /// The query finished and this poller consumed its payload.
    Success(T),
    /// The query finished with an error and this poller consumed its message.
    Failure(String),
}

struct Entry<T> {
    owner: String,
    result: Option<Result<T, String>>,
    wake: Arc<Notify>,
    created_at: Instant,
}

pub struct ResultCache<T> {
    entries: DashMap<RequestId, Entry<T>>,
    next_id: AtomicU64,
}

impl<T> ResultCache<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates an empty entry, owned by `owner`, for a query that is about to run.
    pub fn register(&self, owner: &str) -> RequestId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            id,
            Entry {
                owner: owner.to_string(),
                result: None,
                wake: Arc::new(Notify::new()),
                created_at: Instant::now(),
            },
        );
        trace!("Registered query result slot {id}");
        id
    }

    /// Stores the result of request `id` and wakes its pollers.
    ///
    /// Returns `false` when the result was dropped, either because the entry no
    /// longer exists or because a result had already been stored.
    pub fn complete(&self, id: RequestId, result: Result<T, String>) -> bool {
        let wake = match self.entries.get_mut(&id) {
            Some(mut entry) => {
                if entry.result.is_some() {
                    warn!("Ignoring second result for query {id}");
                    return false;
                }
                entry.result = Some(result);
                Arc::clone(&entry.wake)
            }
            None => {
                debug!("Dropping result for query {id}: no pending request");
                return false;
            }
        };

        wake.notify_waiters();
        true
    }

    /// Looks up request `id` on behalf of `owner`, waiting at most `wait` for
    /// it to complete.
    ///
    /// A zero `wait` never suspends: the poller gets the result if it is already
    /// there and `Pending` otherwise.
    pub async fn poll(&self, owner: &str, id: RequestId, wait: Duration) -> PollOutcome<T> {
        let wake = match self.entries.get(&id) {
            Some(entry) if entry.owner == owner => Arc::clone(&entry.wake),
            Some(_) => {
                debug!("Refusing poll of query {id} from a session that does not own it");
                return PollOutcome::NotFound;
            }
            None => return PollOutcome::NotFound,
        };

        // Must be enabled before checking the entry, otherwise a completion
        // landing between the check and the wait is missed.
        let notified = wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(outcome) = self.take_completed(owner, id) {
            return outcome;
        }

        if !wait.is_zero() && time::timeout(wait, notified).await.is_err() {
            trace!("Bounded wait of {wait:?} elapsed for query {id}");
        }

        match self.take_completed(owner, id) {
            Some(outcome) => outcome,
            None if self.is_owned_by(id, owner) => PollOutcome::Pending(id),
            None => PollOutcome::NotFound,
        }
    }

    /// Drops every entry registered more than `ttl` ago, returning how many
    /// were removed. Pollers waiting on an evicted entry are woken.
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        let mut evicted = 0;
        self.entries.retain(|id, entry| {
            if entry.created_at.elapsed() < ttl {
                return true;
            }
            debug!(
                "Evicting abandoned query {id} (completed: {})",
                entry.result.is_some()
            );
            entry.wake.notify_waiters();
            evicted += 1;
            false
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_owned_by(&self, id: RequestId, owner: &str) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|entry| entry.owner == owner)
    }

    fn take_completed(&self, owner: &str, id: RequestId) -> Option<PollOutcome<T>> {
        let (_, entry) = self.entries.remove_if(&id, |_, entry| {
            entry.owner == owner && entry.result.is_some()
        })?;

        match entry.result {
            Some(Ok(payload)) => Some(PollOutcome::Success(payload)),
            Some(Err(message)) => Some(PollOutcome::Failure(message)),
            None => None,
        }
    }
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `evict_expired` on `cache` for as long as the process lives.
pub fn spawn_sweeper<T>(cache: Arc<ResultCache<T>>, ttl: Duration) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    let period = (ttl / 4).max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = cache.evict_expired(ttl);
            if evicted > 0 {
                info!("Evicted {evicted} abandoned query result(s)");
            }
        }
    })
}

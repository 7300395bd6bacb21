//! Task scheduler: runs task units on a bounded pool of execution slots.
//!
//! [`TaskScheduler::submit`] never waits. Each unit is spawned right away
//! and then waits for one of `max_concurrent_tasks` slots, so excess units
//! queue without blocking the producer. Units bound to a host (image
//! downloads) first take one of that host's `max_threads_per_host` slots.
//! Failed units are not retried.

use crate::error::{Error, Result};
use crate::tasks::{TaskContext, TaskUnit};
use crate::types::TaskStats;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;

/// A resizable set of slots
struct Pool {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl Pool {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Growing takes effect immediately. Shrinking takes effect as running
    /// units release their slots. Returns whether the capacity changed.
    fn resize(&mut self, target: usize, shutdown: &CancellationToken) -> bool {
        let target = target.max(1);
        if target > self.capacity {
            self.slots.add_permits(target - self.capacity);
        } else if target < self.capacity {
            let excess = (self.capacity - target) as u32;
            let slots = Arc::clone(&self.slots);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    permits = slots.acquire_many_owned(excess) => {
                        if let Ok(permits) = permits {
                            permits.forget();
                        }
                    }
                }
            });
        }
        let changed = target != self.capacity;
        self.capacity = target;
        changed
    }
}

struct Pools {
    global: Pool,
    per_host: usize,
    hosts: HashMap<String, Pool>,
}

impl Pools {
    fn host_slots(&mut self, host: &str) -> Arc<Semaphore> {
        let per_host = self.per_host;
        let pool = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| Pool::new(per_host));
        Arc::clone(&pool.slots)
    }
}

/// Units of one post; cancelling `cancel` stops all of them
struct PostUnits {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl PostUnits {
    fn new(shutdown: &CancellationToken) -> Self {
        Self {
            cancel: shutdown.child_token(),
            tracker: TaskTracker::new(),
        }
    }
}

/// Slots held by a running unit
struct Slots {
    _pool: OwnedSemaphorePermit,
    _host: Option<OwnedSemaphorePermit>,
}

struct Inner {
    ctx: TaskContext,
    pools: Mutex<Pools>,
    posts: Mutex<HashMap<String, PostUnits>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    accepting: AtomicBool,
    queued: AtomicUsize,
}

// Critical sections never await, so a std mutex is enough
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    /// Cancellation token and tracker token for a new unit of `post_id`
    fn register_post(&self, post_id: &str) -> (CancellationToken, TaskTrackerToken) {
        let mut posts = lock(&self.posts);
        posts.retain(|_, units| !units.tracker.is_empty());
        let units = posts
            .entry(post_id.to_string())
            .or_insert_with(|| PostUnits::new(&self.shutdown));
        if units.cancel.is_cancelled() {
            // the post was stopped; later units start a fresh group
            *units = PostUnits::new(&self.shutdown);
        }
        (units.cancel.clone(), units.tracker.token())
    }

    /// Take the host slot (if any), then a pool slot
    async fn acquire_slots(&self, host: Option<&str>) -> Option<Slots> {
        let host_permit = match host {
            Some(host) => {
                let slots = lock(&self.pools).host_slots(host);
                Some(slots.acquire_owned().await.ok()?)
            }
            None => None,
        };
        let slots = Arc::clone(&lock(&self.pools).global.slots);
        let permit = slots.acquire_owned().await.ok()?;
        Some(Slots {
            _pool: permit,
            _host: host_permit,
        })
    }
}

/// Dispatches task units (cloneable, all clones share state)
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<Inner>,
}

/// Counts a unit as queued until dropped
struct Queued(Arc<Inner>);

impl Queued {
    fn new(inner: Arc<Inner>) -> Self {
        inner.queued.fetch_add(1, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for Queued {
    fn drop(&mut self) {
        self.0.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TaskScheduler {
    /// Create a scheduler with `max_concurrent_tasks` slots (at least one)
    ///
    /// The per-host limit is taken from the context's current settings.
    pub fn new(ctx: TaskContext, max_concurrent_tasks: usize) -> Self {
        let per_host = ctx
            .settings
            .current_snapshot()
            .connection
            .max_threads_per_host
            .max(1);
        Self {
            inner: Arc::new(Inner {
                ctx,
                pools: Mutex::new(Pools {
                    global: Pool::new(max_concurrent_tasks),
                    per_host,
                    hosts: HashMap::new(),
                }),
                posts: Mutex::new(HashMap::new()),
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                accepting: AtomicBool::new(true),
                queued: AtomicUsize::new(0),
            }),
        }
    }

    /// Accept `unit` for execution
    ///
    /// Returns [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has
    /// been called. The unit's own success or failure is never reported
    /// here; failures end up in the event log.
    pub fn submit(&self, unit: impl Into<TaskUnit>) -> Result<()> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let unit = unit.into();
        let (cancel, post_token) = match unit.as_task().post_id() {
            Some(post_id) => {
                let (cancel, token) = self.inner.register_post(post_id);
                (cancel, Some(token))
            }
            None => (self.inner.shutdown.clone(), None),
        };
        let inner = Arc::clone(&self.inner);
        let queued = Queued::new(Arc::clone(&self.inner));

        self.inner.tracker.spawn(async move {
            let _post_token = post_token;
            let task = unit.as_task();
            let log_type = task.log_type();
            let host = task.host();

            let slots = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                slots = inner.acquire_slots(host.as_deref()) => slots,
            };
            drop(queued);

            let Some(_slots) = slots else {
                tracing::debug!(%log_type, "Queued task cancelled");
                task.cancelled(&inner.ctx).await;
                return;
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(%log_type, "Running task cancelled");
                    task.cancelled(&inner.ctx).await;
                }
                outcome = unit.run(&inner.ctx) => {
                    tracing::trace!(%log_type, ?outcome, "Task finished");
                }
            }
        });

        Ok(())
    }

    /// Units executing right now
    pub fn in_flight_count(&self) -> usize {
        self.inner.ctx.gauge.current()
    }

    /// Units waiting for a slot
    pub fn queued_count(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    /// Running and queued counts
    pub fn stats(&self) -> TaskStats {
        TaskStats {
            running: self.in_flight_count(),
            queued: self.queued_count(),
        }
    }

    /// Change the number of slots
    ///
    /// Growing takes effect immediately. Shrinking takes effect as running
    /// units release their slots.
    pub fn resize(&self, max_concurrent_tasks: usize) {
        let mut pools = lock(&self.inner.pools);
        let from = pools.global.capacity;
        if pools.global.resize(max_concurrent_tasks, &self.inner.shutdown) {
            tracing::info!(from, to = pools.global.capacity, "Task pool resized");
        }
    }

    /// Change the number of units allowed to run against one host
    pub fn set_host_limit(&self, max_threads_per_host: usize) {
        let target = max_threads_per_host.max(1);
        let mut pools = lock(&self.inner.pools);
        if pools.per_host == target {
            return;
        }
        tracing::info!(from = pools.per_host, to = target, "Per-host limit changed");
        pools.per_host = target;
        for pool in pools.hosts.values_mut() {
            pool.resize(target, &self.inner.shutdown);
        }
    }

    /// Whether units of `post_id` are queued or running
    pub fn is_post_active(&self, post_id: &str) -> bool {
        lock(&self.inner.posts)
            .get(post_id)
            .is_some_and(|units| !units.tracker.is_empty())
    }

    /// Cancel the queued and running units of `post_id` and wait until they
    /// have unwound
    ///
    /// Returns how many units were stopped. Units submitted for the post
    /// afterwards run normally.
    pub async fn stop_post(&self, post_id: &str) -> usize {
        let group = {
            let posts = lock(&self.inner.posts);
            posts
                .get(post_id)
                .map(|units| (units.cancel.clone(), units.tracker.clone()))
        };
        let Some((cancel, tracker)) = group else {
            return 0;
        };

        let stopping = tracker.len();
        cancel.cancel();
        tracker.close();
        tracker.wait().await;

        let mut posts = lock(&self.inner.posts);
        if posts
            .get(post_id)
            .is_some_and(|units| units.cancel.is_cancelled())
        {
            posts.remove(post_id);
        }
        tracing::debug!(post_id, stopping, "Post units stopped");
        stopping
    }

    /// Wait until every unit submitted so far has finished
    ///
    /// Units submitted while draining are waited for as well.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        if self.inner.accepting.load(Ordering::SeqCst) {
            self.inner.tracker.reopen();
        }
    }

    /// Stop accepting units, cancel queued and running ones, and wait up to
    /// `timeout` for them to unwind
    ///
    /// Returns `true` when every unit finished within the timeout.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner.tracker.close();
        self.inner.shutdown.cancel();
        tracing::info!(
            running = self.in_flight_count(),
            queued = self.queued_count(),
            "Cancelling tasks"
        );

        match tokio::time::timeout(timeout, self.inner.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("All tasks stopped");
                true
            }
            Err(_) => {
                tracing::warn!(
                    remaining = self.inner.tracker.len(),
                    "Timeout waiting for tasks to stop"
                );
                false
            }
        }
    }

    /// Whether [`submit`](Self::submit) still accepts units
    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

//! Delayed task scheduling for debounced writes.
//!
//! Cancelling a token stops a task that is still waiting for its delay. A
//! task that has already started runs to completion.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// A unit of deferred work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Identifies a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelToken(u64);

pub trait Scheduler: Send + Sync + 'static {
    /// Runs `task` after `delay`.
    fn schedule(&self, delay: Duration, task: Task) -> CancelToken;

    /// Drops a task that has not started yet. Unknown tokens are ignored.
    fn cancel(&self, token: CancelToken);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scheduler backed by the tokio runtime timer.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    next_id: Arc<AtomicU64>,
    waiting: Arc<Mutex<HashMap<u64, AbortHandle>>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: Arc::new(AtomicU64::new(1)),
            waiting: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Scheduler on the runtime of the calling context, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Number of tasks still waiting for their delay.
    pub fn waiting(&self) -> usize {
        lock(&self.waiting).len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> CancelToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let waiting = Arc::clone(&self.waiting);
        // Hold the lock until the abort handle is registered so the task
        // cannot look itself up before it exists.
        let mut guard = lock(&self.waiting);
        let handle = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if lock(&waiting).remove(&id).is_none() {
                return;
            }
            task.await;
        });
        guard.insert(id, handle.abort_handle());
        CancelToken(id)
    }

    fn cancel(&self, token: CancelToken) {
        if let Some(handle) = lock(&self.waiting).remove(&token.0) {
            handle.abort();
        }
    }
}

struct ManualEntry {
    id: u64,
    due: Duration,
    task: Task,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    entries: Vec<ManualEntry>,
}

/// Deterministic scheduler driven by virtual time.
///
/// Nothing runs until [`ManualScheduler::advance`] moves the clock past a
/// task's due time.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks not yet run or cancelled.
    pub fn pending(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn now(&self) -> Duration {
        lock(&self.state).now
    }

    /// Moves virtual time forward and runs every task that became due, in
    /// due order. Tasks scheduled while running are picked up if due.
    pub async fn advance(&self, by: Duration) -> usize {
        lock(&self.state).now += by;
        let mut ran = 0;
        while let Some(task) = self.take_next_due() {
            task.await;
            ran += 1;
        }
        ran
    }

    /// Runs tasks already due without moving time.
    pub async fn run_due(&self) -> usize {
        self.advance(Duration::ZERO).await
    }

    fn take_next_due(&self) -> Option<Task> {
        let mut state = lock(&self.state);
        let now = state.now;
        let position = state
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= now)
            .min_by_key(|(_, entry)| (entry.due, entry.id))
            .map(|(position, _)| position)?;
        Some(state.entries.remove(position).task)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> CancelToken {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        let due = state.now + delay;
        state.entries.push(ManualEntry { id, due, task });
        CancelToken(id)
    }

    fn cancel(&self, token: CancelToken) {
        lock(&self.state).entries.retain(|entry| entry.id != token.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn manual_scheduler_runs_only_due_tasks() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::from_millis(500), counting_task(&counter));
        scheduler.schedule(Duration::from_millis(100), counting_task(&counter));

        assert_eq!(scheduler.advance(Duration::from_millis(200)).await, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.advance(Duration::from_millis(300)).await, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn manual_scheduler_cancel_drops_task() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let token = scheduler.schedule(Duration::from_millis(10), counting_task(&counter));
        scheduler.cancel(token);
        scheduler.advance(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_cancel_stops_waiting_task() {
        let scheduler = TokioScheduler::current().expect("inside runtime");
        let counter = Arc::new(AtomicUsize::new(0));
        let cancelled = scheduler.schedule(Duration::from_millis(500), counting_task(&counter));
        scheduler.schedule(Duration::from_millis(500), counting_task(&counter));
        scheduler.cancel(cancelled);

        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.waiting(), 0);
    }
}

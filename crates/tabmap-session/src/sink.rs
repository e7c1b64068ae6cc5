//! Draft persistence: every snapshot goes to the local cache at once and to
//! the remote store after a quiet period.
//!
//! A burst of edits produces one remote write carrying the last snapshot.
//! Failures on either side are logged and dropped; a draft is a convenience
//! and never blocks editing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tabmap_model::DraftState;

use crate::backend::{LocalDraftCache, RemoteDraftStore};
use crate::scheduler::{CancelToken, Scheduler, Task};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct SinkState {
    /// Latest snapshot not yet confirmed remotely, tagged with its sequence
    /// number.
    pending: Option<(u64, DraftState)>,
    seq: u64,
    timer: Option<CancelToken>,
}

/// Writes draft snapshots of one tab.
pub struct DraftSink<L, R, S>
where
    L: LocalDraftCache,
    R: RemoteDraftStore,
    S: Scheduler,
{
    source_id: String,
    tab: String,
    local: Arc<L>,
    remote: Arc<R>,
    scheduler: Arc<S>,
    debounce: Duration,
    ready: bool,
    completed: bool,
    state: Arc<Mutex<SinkState>>,
}

impl<L, R, S> DraftSink<L, R, S>
where
    L: LocalDraftCache,
    R: RemoteDraftStore,
    S: Scheduler,
{
    pub fn new(
        source_id: impl Into<String>,
        tab: impl Into<String>,
        local: Arc<L>,
        remote: Arc<R>,
        scheduler: Arc<S>,
        debounce: Duration,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            tab: tab.into(),
            local,
            remote,
            scheduler,
            debounce,
            ready: false,
            completed: false,
            state: Arc::new(Mutex::new(SinkState::default())),
        }
    }

    /// Starts accepting snapshots. Called once reconciliation has decided
    /// the initial state, so a half-loaded store never overwrites a draft.
    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// True while a snapshot waits for a successful remote write.
    pub fn has_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    /// Persists `snapshot`. Returns false when it was ignored.
    pub fn record(&self, snapshot: DraftState) -> bool {
        if !self.ready || self.completed || !snapshot.has_columns() {
            return false;
        }

        if let Err(error) = self.local.write(&self.source_id, &self.tab, &snapshot) {
            tracing::warn!(
                source_id = %self.source_id,
                tab = %self.tab,
                error = %error,
                "failed to write local draft"
            );
        }

        let mut state = lock(&self.state);
        state.seq += 1;
        let seq = state.seq;
        if let Some(token) = state.timer.take() {
            self.scheduler.cancel(token);
        }
        let task = self.remote_write(seq, snapshot.clone());
        state.pending = Some((seq, snapshot));
        state.timer = Some(self.scheduler.schedule(self.debounce, task));
        tracing::trace!(seq, "draft recorded");
        true
    }

    /// Sends any pending snapshot right away without waiting for it.
    /// Returns true when a write was scheduled.
    pub fn flush(&self) -> bool {
        let mut state = lock(&self.state);
        if let Some(token) = state.timer.take() {
            self.scheduler.cancel(token);
        }
        let Some((seq, draft)) = state.pending.take() else {
            return false;
        };
        drop(state);
        tracing::debug!(seq, "flushing pending draft");
        self.scheduler.schedule(Duration::ZERO, self.remote_write(seq, draft));
        true
    }

    /// Sends any pending snapshot and waits for the write to finish.
    /// Returns true when a snapshot reached the remote store. On failure the
    /// snapshot stays pending unless a newer one was recorded meanwhile.
    pub async fn settle(&self) -> bool {
        let pending = {
            let mut state = lock(&self.state);
            if let Some(token) = state.timer.take() {
                self.scheduler.cancel(token);
            }
            state.pending.take()
        };
        let Some((seq, draft)) = pending else {
            return false;
        };
        match self.remote.put(&self.source_id, &self.tab, &draft).await {
            Ok(()) => {
                tracing::debug!(seq, "draft settled");
                true
            }
            Err(error) => {
                tracing::warn!(seq, error = %error, "failed to write remote draft");
                let mut state = lock(&self.state);
                if state.pending.is_none() && !self.completed {
                    state.pending = Some((seq, draft));
                }
                false
            }
        }
    }

    /// Forgets the draft after a successful commit.
    ///
    /// The pending snapshot is cleared before anything is deleted, so no
    /// debounced write can recreate a draft behind the delete.
    pub async fn complete(&mut self) {
        self.completed = true;
        {
            let mut state = lock(&self.state);
            state.pending = None;
            if let Some(token) = state.timer.take() {
                self.scheduler.cancel(token);
            }
        }
        if let Err(error) = self.local.remove(&self.source_id, &self.tab) {
            tracing::warn!(
                source_id = %self.source_id,
                tab = %self.tab,
                error = %error,
                "failed to delete local draft"
            );
        }
        if let Err(error) = self.remote.delete(&self.source_id, &self.tab).await {
            tracing::warn!(
                source_id = %self.source_id,
                tab = %self.tab,
                error = %error,
                "failed to delete remote draft"
            );
        }
    }

    fn remote_write(&self, seq: u64, draft: DraftState) -> Task {
        let remote = Arc::clone(&self.remote);
        let state = Arc::clone(&self.state);
        let source_id = self.source_id.clone();
        let tab = self.tab.clone();
        Box::pin(async move {
            match remote.put(&source_id, &tab, &draft).await {
                Ok(()) => {
                    let mut state = lock(&state);
                    if state.pending.as_ref().is_some_and(|(current, _)| *current == seq) {
                        state.pending = None;
                    }
                    tracing::debug!(%source_id, %tab, seq, "remote draft written");
                }
                Err(error) => {
                    tracing::warn!(
                        %source_id,
                        %tab,
                        seq,
                        error = %error,
                        "failed to write remote draft"
                    );
                }
            }
        })
    }
}

impl<L, R, S> Drop for DraftSink<L, R, S>
where
    L: LocalDraftCache,
    R: RemoteDraftStore,
    S: Scheduler,
{
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryDraftStore;
    use crate::scheduler::ManualScheduler;
    use tabmap_model::{ColumnClassification, Phase};

    type TestSink = DraftSink<MemoryDraftStore, MemoryDraftStore, ManualScheduler>;

    fn snapshot(timestamp: i64) -> DraftState {
        DraftState {
            phase: Phase::Classify,
            header_row: 0,
            columns: vec![ColumnClassification::new(0, "Brand")],
            timestamp,
        }
    }

    fn sink() -> (TestSink, Arc<MemoryDraftStore>, Arc<MemoryDraftStore>, Arc<ManualScheduler>) {
        let local = Arc::new(MemoryDraftStore::new());
        let remote = Arc::new(MemoryDraftStore::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let sink = DraftSink::new(
            "src",
            "Sheet1",
            Arc::clone(&local),
            Arc::clone(&remote),
            Arc::clone(&scheduler),
            Duration::from_millis(500),
        );
        (sink, local, remote, scheduler)
    }

    #[tokio::test]
    async fn ignores_snapshots_until_ready() {
        let (mut sink, local, _, scheduler) = sink();
        assert!(!sink.record(snapshot(1)));
        assert_eq!(local.write_count(), 0);
        assert_eq!(scheduler.pending(), 0);

        sink.mark_ready();
        let mut empty = snapshot(2);
        empty.columns.clear();
        assert!(!sink.record(empty));
        assert!(sink.record(snapshot(3)));
        assert_eq!(local.write_count(), 1);
    }

    #[tokio::test]
    async fn burst_collapses_into_one_remote_write() {
        let (mut sink, local, remote, scheduler) = sink();
        sink.mark_ready();
        for timestamp in 1..=5 {
            sink.record(snapshot(timestamp));
            scheduler.advance(Duration::from_millis(100)).await;
        }
        assert_eq!(local.write_count(), 5);
        assert_eq!(remote.write_count(), 0);

        scheduler.advance(Duration::from_millis(400)).await;
        assert_eq!(remote.write_count(), 1);
        assert_eq!(remote.draft("src", "Sheet1").map(|d| d.timestamp), Some(5));
        assert!(!sink.has_pending());
    }

    #[tokio::test]
    async fn flush_writes_pending_immediately() {
        let (mut sink, _, remote, scheduler) = sink();
        sink.mark_ready();
        sink.record(snapshot(7));
        assert!(sink.flush());
        assert!(!sink.flush());

        assert_eq!(scheduler.run_due().await, 1);
        assert_eq!(remote.draft("src", "Sheet1").map(|d| d.timestamp), Some(7));
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn failed_remote_write_is_dropped() {
        let (mut sink, local, remote, scheduler) = sink();
        sink.mark_ready();
        remote.set_failing(true);
        sink.record(snapshot(1));
        scheduler.advance(Duration::from_secs(1)).await;

        assert_eq!(local.write_count(), 1);
        assert_eq!(remote.write_count(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn complete_clears_pending_before_deleting() {
        let (mut sink, local, remote, scheduler) = sink();
        sink.mark_ready();
        sink.record(snapshot(1));
        sink.complete().await;

        assert!(!sink.has_pending());
        assert_eq!(scheduler.pending(), 0);
        assert!(local.draft("src", "Sheet1").is_none());
        assert_eq!(remote.delete_count(), 1);

        // nothing left to flush and later edits are ignored
        assert!(!sink.record(snapshot(2)));
        drop(sink);
        scheduler.advance(Duration::from_secs(1)).await;
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn drop_flushes_pending() {
        let (mut sink, _, remote, scheduler) = sink();
        sink.mark_ready();
        sink.record(snapshot(9));
        drop(sink);
        scheduler.run_due().await;
        assert_eq!(remote.draft("src", "Sheet1").map(|d| d.timestamp), Some(9));
    }

    #[tokio::test]
    async fn settle_waits_for_the_write() {
        let (mut sink, _, remote, scheduler) = sink();
        sink.mark_ready();
        sink.record(snapshot(4));
        assert!(sink.settle().await);
        assert_eq!(remote.write_count(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn failed_settle_keeps_the_snapshot_pending() {
        let (mut sink, _, remote, _) = sink();
        sink.mark_ready();
        sink.record(snapshot(4));
        remote.set_failing(true);

        assert!(!sink.settle().await);
        assert!(sink.has_pending());

        remote.set_failing(false);
        assert!(sink.settle().await);
        assert_eq!(remote.draft("src", "Sheet1").map(|d| d.timestamp), Some(4));
        assert!(!sink.has_pending());
    }
}

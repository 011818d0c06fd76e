//! Tokio-backed timer service.
//!
//! Each scheduled timer is a task that sleeps and then posts
//! [`WorkItem::TimerExpired`] to the node's work queue. The buffer a timer
//! holds stays here until the expiry is processed, so cancelling a timer
//! always hands its buffer back, even if the task already fired and its
//! work item is still queued.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use meshcomm_commissioning::{TimerHandle, TimerPurpose};
use meshcomm_core::BufRef;

use crate::node::WorkItem;

#[derive(Debug)]
struct PendingTimer {
    generation: u64,
    task: JoinHandle<()>,
    buf: Option<BufRef>,
}

/// Outcome of processing a timer's work item.
#[derive(Debug)]
pub enum Expiry {
    /// The timer was still armed; here is the buffer it held.
    Fired(Option<BufRef>),
    /// The timer was cancelled or replaced after its task fired.
    Stale,
}

#[derive(Debug)]
pub struct TimerService {
    tx: mpsc::Sender<WorkItem>,
    started: Instant,
    generation: u64,
    pending: HashMap<TimerPurpose, PendingTimer>,
}

impl TimerService {
    pub fn new(tx: mpsc::Sender<WorkItem>) -> Self {
        Self {
            tx,
            started: Instant::now(),
            generation: 0,
            pending: HashMap::new(),
        }
    }

    /// Time since the service was created.
    pub fn now(&self) -> Duration {
        self.started.elapsed()
    }

    /// Spawn a timer task. The caller must have cancelled any pending
    /// timer of the same purpose.
    pub fn schedule(
        &mut self,
        purpose: TimerPurpose,
        delay: Duration,
        buf: Option<BufRef>,
    ) -> TimerHandle {
        self.generation += 1;
        let handle = TimerHandle {
            purpose,
            generation: self.generation,
        };

        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(WorkItem::TimerExpired(handle)).await;
        });

        self.pending.insert(
            purpose,
            PendingTimer {
                generation: handle.generation,
                task,
                buf,
            },
        );
        handle
    }

    /// Cancel the pending `purpose` timer, returning the buffer it held.
    pub fn cancel(&mut self, purpose: TimerPurpose) -> Option<BufRef> {
        let timer = self.pending.remove(&purpose)?;
        timer.task.abort();
        timer.buf
    }

    pub fn is_pending(&self, purpose: TimerPurpose) -> bool {
        self.pending.contains_key(&purpose)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Claim the expiry of `handle`.
    pub fn expire(&mut self, handle: TimerHandle) -> Expiry {
        match self.pending.get(&handle.purpose) {
            Some(timer) if timer.generation == handle.generation => {}
            _ => return Expiry::Stale,
        }
        match self.pending.remove(&handle.purpose) {
            Some(timer) => Expiry::Fired(timer.buf),
            None => Expiry::Stale,
        }
    }

    /// Abort every timer task, returning the buffers they held.
    pub fn shutdown(&mut self) -> Vec<BufRef> {
        self.pending
            .drain()
            .filter_map(|(_, timer)| {
                timer.task.abort();
                timer.buf
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (TimerService, mpsc::Receiver<WorkItem>) {
        let (tx, rx) = mpsc::channel(16);
        (TimerService::new(tx), rx)
    }

    async fn next_handle(rx: &mut mpsc::Receiver<WorkItem>) -> TimerHandle {
        match rx.recv().await {
            Some(WorkItem::TimerExpired(handle)) => handle,
            other => panic!("expected a timer expiry, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_delay() {
        let (mut timers, mut rx) = service();
        let handle = timers.schedule(
            TimerPurpose::DiscoveryQuery,
            Duration::from_secs(2),
            Some(BufRef::from_raw(4)),
        );

        let fired = next_handle(&mut rx).await;
        assert_eq!(fired, handle);
        assert!(timers.now() >= Duration::from_secs(2));

        match timers.expire(fired) {
            Expiry::Fired(Some(buf)) => assert_eq!(buf.into_raw(), 4),
            other => panic!("unexpected expiry {other:?}"),
        }
        assert!(!timers.is_pending(TimerPurpose::DiscoveryQuery));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_returns_buffer_and_silences_task() {
        let (mut timers, mut rx) = service();
        timers.schedule(
            TimerPurpose::DiscoveryQuery,
            Duration::from_secs(1),
            Some(BufRef::from_raw(2)),
        );
        let buf = timers.cancel(TimerPurpose::DiscoveryQuery).unwrap();
        assert_eq!(buf.into_raw(), 2);
        assert!(timers.cancel(TimerPurpose::DiscoveryQuery).is_none());

        let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(waited.is_err(), "cancelled timer still fired");
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_timer_expiry_is_stale() {
        let (mut timers, mut rx) = service();
        let first = timers.schedule(TimerPurpose::ButtonPoll, Duration::ZERO, None);
        let stale = next_handle(&mut rx).await;
        assert_eq!(stale, first);

        // re-armed before the first expiry was processed
        assert!(timers.cancel(TimerPurpose::ButtonPoll).is_none());
        let second = timers.schedule(TimerPurpose::ButtonPoll, Duration::from_millis(50), None);

        assert!(matches!(timers.expire(stale), Expiry::Stale));
        assert!(timers.is_pending(TimerPurpose::ButtonPoll));

        let fired = next_handle(&mut rx).await;
        assert_eq!(fired, second);
        assert!(matches!(timers.expire(fired), Expiry::Fired(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_hands_back_buffers() {
        let (mut timers, _rx) = service();
        timers.schedule(
            TimerPurpose::DiscoveryQuery,
            Duration::from_secs(2),
            Some(BufRef::from_raw(1)),
        );
        timers.schedule(TimerPurpose::DiscoveryTimeout, Duration::from_secs(5), None);

        let bufs = timers.shutdown();
        assert_eq!(bufs.len(), 1);
        assert_eq!(timers.pending_count(), 0);
        for buf in bufs {
            assert_eq!(buf.into_raw(), 1);
        }
    }
}

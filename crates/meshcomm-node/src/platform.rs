//! The engine's collaborators, assembled for the host runtime.

use std::time::Duration;

use tokio::sync::mpsc;

use meshcomm_commissioning::{
    Board, BufferError, BufferPool, ButtonId, CommissioningMode, Indicator, NodeRole, RadioStack,
    Scheduler, SendError, TimerHandle, TimerPurpose, ZclTarget,
};
use meshcomm_core::BufRef;

use crate::board::LogBoard;
use crate::config::NodeConfig;
use crate::node::WorkItem;
use crate::pool::SlabPool;
use crate::scheduler::{Expiry, TimerService};
use crate::sim::SimulatedStack;

#[derive(Debug)]
pub struct RuntimePlatform {
    pub pool: SlabPool,
    pub timers: TimerService,
    pub stack: SimulatedStack,
    pub board: LogBoard,
}

impl RuntimePlatform {
    pub fn new(config: &NodeConfig, role: NodeRole, tx: mpsc::Sender<WorkItem>) -> Self {
        let mut board = LogBoard::new();
        if config.simulation.sleepy_button_held {
            board.press(ButtonId(config.buttons.sleepy));
        }
        Self {
            pool: SlabPool::new(config.pool.buffers, config.pool.buffer_size),
            timers: TimerService::new(tx.clone()),
            stack: SimulatedStack::new(&config.simulation, role, tx),
            board,
        }
    }

    /// Claim a timer expiry; stale expiries yield `None`.
    pub fn expire(&mut self, handle: TimerHandle) -> Option<Option<BufRef>> {
        match self.timers.expire(handle) {
            Expiry::Fired(buf) => Some(buf),
            Expiry::Stale => {
                tracing::trace!(purpose = %handle.purpose, "stale timer expiry");
                None
            }
        }
    }

    /// Copy a signal payload into a fresh buffer.
    pub fn buffer_with(&mut self, payload: &[u8]) -> Result<BufRef, BufferError> {
        let buf = self.pool.alloc().ok_or(BufferError::Exhausted)?;
        match self.pool.initial_alloc(&buf, payload.len()) {
            Ok(dst) => {
                dst.copy_from_slice(payload);
                Ok(buf)
            }
            Err(e) => {
                self.release(buf);
                Err(e)
            }
        }
    }

    /// Stop every timer and return the buffers they held.
    pub fn shutdown(&mut self) {
        for buf in self.timers.shutdown() {
            if let Err(e) = self.pool.release(buf) {
                tracing::warn!("release at shutdown failed: {e}");
            }
        }
    }

    /// Hand a freed buffer to the oldest delayed allocation still wanted.
    fn serve_waiters(&mut self) {
        while let Some(purpose) = self.pool.pop_waiter() {
            if self.timers.is_pending(purpose) {
                tracing::debug!(%purpose, "delayed allocation superseded");
                continue;
            }
            if let Some(buf) = self.pool.alloc() {
                tracing::trace!(%purpose, "delayed allocation served");
                self.timers.schedule(purpose, Duration::ZERO, Some(buf));
            }
            return;
        }
    }
}

impl BufferPool for RuntimePlatform {
    fn alloc(&mut self) -> Option<BufRef> {
        self.pool.alloc()
    }

    fn alloc_delayed(&mut self, purpose: TimerPurpose) -> Result<(), BufferError> {
        match self.pool.alloc() {
            Some(buf) => {
                self.schedule(purpose, Duration::ZERO, Some(buf));
                Ok(())
            }
            None => self.pool.push_waiter(purpose),
        }
    }

    fn release(&mut self, buf: BufRef) {
        if let Err(e) = self.pool.release(buf) {
            tracing::warn!("buffer release failed: {e}");
            return;
        }
        self.serve_waiters();
    }

    fn initial_alloc(&mut self, buf: &BufRef, size: usize) -> Result<&mut [u8], BufferError> {
        self.pool.initial_alloc(buf, size)
    }

    fn payload(&self, buf: &BufRef) -> &[u8] {
        self.pool.payload(buf)
    }
}

impl Scheduler for RuntimePlatform {
    fn now(&self) -> Duration {
        self.timers.now()
    }

    fn schedule(
        &mut self,
        purpose: TimerPurpose,
        delay: Duration,
        buf: Option<BufRef>,
    ) -> TimerHandle {
        if self.timers.is_pending(purpose) {
            tracing::warn!(%purpose, "timer armed while one is pending, replacing it");
            if let Some(old) = self.timers.cancel(purpose) {
                self.release(old);
            }
        }
        self.timers.schedule(purpose, delay, buf)
    }

    fn cancel(&mut self, purpose: TimerPurpose) -> Option<BufRef> {
        self.timers.cancel(purpose)
    }

    fn is_pending(&self, purpose: TimerPurpose) -> bool {
        self.timers.is_pending(purpose)
    }
}

impl RadioStack for RuntimePlatform {
    fn is_factory_new(&self) -> bool {
        self.stack.is_factory_new()
    }

    fn start_commissioning(&mut self, mode: CommissioningMode) -> bool {
        self.stack.start_commissioning(mode)
    }

    fn set_rx_on_when_idle(&mut self, rx_on: bool) {
        self.stack.set_rx_on_when_idle(rx_on);
    }

    fn sleep_now(&mut self) {
        self.stack.sleep_now();
    }

    fn send_match_desc(&mut self, buf: BufRef) -> Result<(), SendError> {
        match self.stack.send_match_desc(self.pool.payload(&buf)) {
            Ok(()) => {
                // the query is on air; the stack is done with the buffer
                self.release(buf);
                Ok(())
            }
            Err(reason) => Err(SendError { buf, reason }),
        }
    }

    fn send_zcl(&mut self, buf: BufRef, target: ZclTarget) -> Result<(), SendError> {
        match self.stack.send_zcl(self.pool.payload(&buf), target) {
            Ok(()) => {
                self.release(buf);
                Ok(())
            }
            Err(reason) => Err(SendError { buf, reason }),
        }
    }
}

impl Board for RuntimePlatform {
    fn set_indicator(&mut self, indicator: Indicator, on: bool) {
        self.board.set_indicator(indicator, on);
    }

    fn is_button_pressed(&self, button: ButtonId) -> bool {
        self.board.is_pressed(button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolSection, SimulationSection};

    fn platform(buffers: usize) -> (RuntimePlatform, mpsc::Receiver<WorkItem>) {
        let config = NodeConfig {
            pool: PoolSection {
                buffers,
                ..PoolSection::default()
            },
            simulation: SimulationSection {
                seed: Some(3),
                ..SimulationSection::default()
            },
            ..NodeConfig::default()
        };
        let (tx, rx) = mpsc::channel(16);
        (RuntimePlatform::new(&config, NodeRole::Router, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_alloc_waits_for_release() {
        let (mut p, mut rx) = platform(1);
        let held = p.alloc().unwrap();
        p.alloc_delayed(TimerPurpose::DiscoveryTimeout).unwrap();
        assert!(!p.is_pending(TimerPurpose::DiscoveryTimeout));
        assert_eq!(p.pool.waiter_count(), 1);

        p.release(held);
        assert!(p.is_pending(TimerPurpose::DiscoveryTimeout));

        let Some(WorkItem::TimerExpired(handle)) = rx.recv().await else {
            panic!("expected the delayed allocation to fire");
        };
        let buf = p.expire(handle).unwrap().unwrap();
        assert_eq!(p.pool.outstanding(), 1);
        p.release(buf);
        assert_eq!(p.pool.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_waiter_is_dropped() {
        let (mut p, _rx) = platform(1);
        let held = p.alloc().unwrap();
        p.alloc_delayed(TimerPurpose::DiscoveryTimeout).unwrap();
        p.schedule(TimerPurpose::DiscoveryTimeout, Duration::from_secs(5), None);

        p.release(held);
        assert_eq!(p.pool.outstanding(), 0);
        assert_eq!(p.pool.waiter_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_releases_displaced_buffer() {
        let (mut p, _rx) = platform(2);
        let buf = p.alloc().unwrap();
        p.schedule(TimerPurpose::DiscoveryQuery, Duration::from_secs(2), Some(buf));
        p.schedule(TimerPurpose::DiscoveryQuery, Duration::from_secs(2), None);
        assert_eq!(p.pool.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_send_hands_buffer_back() {
        let (mut p, _rx) = platform(2);
        // factory new: the stack isn't on a network yet
        let buf = p.buffer_with(&[0; 4]).unwrap();
        let err = p.send_match_desc(buf).unwrap_err();
        assert_eq!(p.pool.outstanding(), 1);
        p.release(err.buf);
        assert_eq!(p.pool.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sleepy_button_from_config() {
        let config = NodeConfig {
            simulation: SimulationSection {
                sleepy_button_held: true,
                ..SimulationSection::default()
            },
            ..NodeConfig::default()
        };
        let (tx, _rx) = mpsc::channel(4);
        let p = RuntimePlatform::new(&config, NodeRole::EndDevice, tx);
        assert!(p.is_button_pressed(ButtonId(config.buttons.sleepy)));
    }
}

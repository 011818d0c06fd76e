//! Timer purposes and the arm/disarm discipline.
//!
//! Every timer the engine uses is identified by why it was armed. At most
//! one timer per purpose is outstanding: [`arm`] cancels the previous one
//! (releasing any buffer it was holding) before scheduling the new one.

use std::fmt;
use std::time::Duration;

use meshcomm_core::BufRef;

use crate::platform::{BufferPool, Scheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerPurpose {
    /// Re-run top-level commissioning after a failure.
    SteeringRestart,
    /// Clear the network indicator when the joining window closes.
    CommissioningWindow,
    /// Send the next capability query (holds the query buffer).
    DiscoveryQuery,
    /// No peer answered in time.
    DiscoveryTimeout,
    /// Re-check a held light button for long-press dimming.
    ButtonPoll,
}

impl TimerPurpose {
    pub const ALL: [TimerPurpose; 5] = [
        TimerPurpose::SteeringRestart,
        TimerPurpose::CommissioningWindow,
        TimerPurpose::DiscoveryQuery,
        TimerPurpose::DiscoveryTimeout,
        TimerPurpose::ButtonPoll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPurpose::SteeringRestart => "steering-restart",
            TimerPurpose::CommissioningWindow => "commissioning-window",
            TimerPurpose::DiscoveryQuery => "discovery-query",
            TimerPurpose::DiscoveryTimeout => "discovery-timeout",
            TimerPurpose::ButtonPoll => "button-poll",
        }
    }
}

impl fmt::Display for TimerPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one scheduled timer.
///
/// The generation distinguishes successive timers of the same purpose, so
/// an expiry that was already queued when its timer got cancelled can be
/// recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    pub purpose: TimerPurpose,
    pub generation: u64,
}

/// Cancel any pending `purpose` timer, then schedule a new one.
pub fn arm<P>(p: &mut P, purpose: TimerPurpose, delay: Duration, buf: Option<BufRef>) -> TimerHandle
where
    P: Scheduler + BufferPool,
{
    disarm(p, purpose);
    let handle = p.schedule(purpose, delay, buf);
    tracing::trace!(%purpose, generation = handle.generation, ?delay, "timer armed");
    handle
}

/// Cancel any pending `purpose` timer and release the buffer it held.
///
/// Returns whether a timer was pending.
pub fn disarm<P>(p: &mut P, purpose: TimerPurpose) -> bool
where
    P: Scheduler + BufferPool,
{
    if !p.is_pending(purpose) {
        return false;
    }
    if let Some(buf) = p.cancel(purpose) {
        p.release(buf);
    }
    tracing::trace!(%purpose, "timer cancelled");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;

    #[test]
    fn arm_replaces_pending_timer() {
        let mut p = MockPlatform::new();
        let buf = p.alloc().unwrap();
        arm(&mut p, TimerPurpose::DiscoveryQuery, Duration::from_secs(2), Some(buf));
        arm(&mut p, TimerPurpose::DiscoveryQuery, Duration::from_secs(3), None);

        assert_eq!(p.pending_count(TimerPurpose::DiscoveryQuery), 1);
        assert_eq!(p.cancel_count(TimerPurpose::DiscoveryQuery), 1);
        // the buffer held by the replaced timer went back to the pool
        assert_eq!(p.outstanding(), 0);
    }

    #[test]
    fn disarm_idle_is_noop() {
        let mut p = MockPlatform::new();
        assert!(!disarm(&mut p, TimerPurpose::SteeringRestart));
        assert_eq!(p.cancel_count(TimerPurpose::SteeringRestart), 0);
    }

    #[test]
    fn handles_have_increasing_generations() {
        let mut p = MockPlatform::new();
        let a = arm(&mut p, TimerPurpose::ButtonPoll, Duration::from_millis(50), None);
        let b = arm(&mut p, TimerPurpose::ButtonPoll, Duration::from_millis(50), None);
        assert!(b.generation > a.generation);
        assert_eq!(b.purpose, TimerPurpose::ButtonPoll);
    }

    #[test]
    fn display_names() {
        assert_eq!(TimerPurpose::DiscoveryTimeout.to_string(), "discovery-timeout");
        assert_eq!(TimerPurpose::ALL.len(), 5);
    }
}

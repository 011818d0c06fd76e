//! In-memory platform for driving the engine in tests.
//!
//! [`MockPlatform`] implements every collaborator trait with plain data: a
//! virtual clock, a counting buffer pool that panics on double release, a
//! scheduler that panics when a second timer of the same purpose is armed,
//! and a stack and board that record what the engine asked of them.
//! Delayed allocations whose purpose was re-armed before a buffer came
//! free are dropped, as on the host runtime.
//! [`Harness`] pairs it with a [`NodeContext`] and advances virtual time,
//! dispatching timers in the order they fall due.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use meshcomm_core::{BufRef, Endpoint, MatchDescResponse, ShortAddr, SignalTag, Status};

use crate::commissioning;
use crate::context::NodeContext;
use crate::dispatch::{self, ButtonEvent};
use crate::error::{BufferError, SendError, StackError};
use crate::platform::{
    Board, BufferPool, ButtonId, CommissioningMode, Indicator, RadioStack, Scheduler, ZclTarget,
};
use crate::settings::NodeSettings;
use crate::timer::{self, TimerHandle, TimerPurpose};

pub const DEFAULT_CAPACITY: usize = 16;
pub const DEFAULT_BUFFER_SIZE: usize = 128;

#[derive(Debug)]
struct PendingTimer {
    due: Duration,
    delay: Duration,
    generation: u64,
    buf: Option<BufRef>,
}

#[derive(Debug, Default)]
struct Slot {
    leased: bool,
    data: Vec<u8>,
}

#[derive(Debug)]
pub struct MockPlatform {
    now: Duration,

    slots: Vec<Slot>,
    buffer_size: usize,
    released: usize,
    waiters: VecDeque<TimerPurpose>,

    timers: BTreeMap<TimerPurpose, PendingTimer>,
    generation: u64,
    cancels: HashMap<TimerPurpose, usize>,

    factory_new: bool,
    stack_busy: bool,
    reject_sends: bool,
    rx_on_when_idle: Option<bool>,
    sleeps: usize,
    starts: Vec<(Duration, CommissioningMode)>,
    queries: Vec<(Duration, Vec<u8>)>,
    in_flight: VecDeque<BufRef>,
    zcl: Vec<(ZclTarget, Vec<u8>)>,

    indicators: HashMap<Indicator, bool>,
    pressed: HashSet<ButtonId>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity <= usize::from(u8::MAX) + 1, "buffer ids are one byte");
        Self {
            now: Duration::ZERO,
            slots: (0..capacity).map(|_| Slot::default()).collect(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            released: 0,
            waiters: VecDeque::new(),
            timers: BTreeMap::new(),
            generation: 0,
            cancels: HashMap::new(),
            factory_new: true,
            stack_busy: false,
            reject_sends: false,
            rx_on_when_idle: None,
            sleeps: 0,
            starts: Vec::new(),
            queries: Vec::new(),
            in_flight: VecDeque::new(),
            zcl: Vec::new(),
            indicators: HashMap::new(),
            pressed: HashSet::new(),
        }
    }

    // clock

    pub fn set_now(&mut self, now: Duration) {
        assert!(now >= self.now, "virtual clock can't go backwards");
        self.now = now;
    }

    // pool

    /// Buffers currently leased out.
    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|slot| slot.leased).count()
    }

    pub fn released_count(&self) -> usize {
        self.released
    }

    /// Delayed allocations still waiting for a free buffer.
    pub fn delayed_waiters(&self) -> usize {
        self.waiters.len()
    }

    fn lease(&mut self) -> Option<BufRef> {
        let index = self.slots.iter().position(|slot| !slot.leased)?;
        let slot = &mut self.slots[index];
        slot.leased = true;
        slot.data.clear();
        u8::try_from(index).ok().map(BufRef::from_raw)
    }

    fn slot_mut(&mut self, buf: &BufRef) -> Result<&mut Slot, BufferError> {
        self.slots
            .get_mut(usize::from(buf.index()))
            .filter(|slot| slot.leased)
            .ok_or(BufferError::UnknownBuffer(buf.index()))
    }

    // scheduler

    pub fn pending_count(&self, purpose: TimerPurpose) -> usize {
        usize::from(self.timers.contains_key(&purpose))
    }

    /// The delay the pending `purpose` timer was armed with.
    pub fn pending_delay(&self, purpose: TimerPurpose) -> Option<Duration> {
        self.timers.get(&purpose).map(|timer| timer.delay)
    }

    pub fn next_due(&self, purpose: TimerPurpose) -> Option<Duration> {
        self.timers.get(&purpose).map(|timer| timer.due)
    }

    /// The earliest pending timer; ties go to the one armed first.
    pub fn next_expiry(&self) -> Option<(Duration, TimerPurpose)> {
        self.timers
            .iter()
            .min_by_key(|(_, timer)| (timer.due, timer.generation))
            .map(|(purpose, timer)| (timer.due, *purpose))
    }

    /// Remove the pending `purpose` timer as if it expired, returning its buffer.
    ///
    /// Panics if no such timer is pending.
    pub fn fire(&mut self, purpose: TimerPurpose) -> Option<BufRef> {
        let timer = self
            .timers
            .remove(&purpose)
            .unwrap_or_else(|| panic!("no {purpose} timer pending"));
        timer.buf
    }

    pub fn cancel_count(&self, purpose: TimerPurpose) -> usize {
        self.cancels.get(&purpose).copied().unwrap_or(0)
    }

    // stack

    pub fn set_factory_new(&mut self, factory_new: bool) {
        self.factory_new = factory_new;
    }

    /// Make the stack refuse every commissioning request.
    pub fn set_stack_busy(&mut self, busy: bool) {
        self.stack_busy = busy;
    }

    /// Make every send fail with a full transmit queue.
    pub fn reject_sends(&mut self, reject: bool) {
        self.reject_sends = reject;
    }

    pub fn commissioning_starts(&self) -> Vec<CommissioningMode> {
        self.starts.iter().map(|(_, mode)| *mode).collect()
    }

    pub fn commissioning_start_times(&self) -> Vec<Duration> {
        self.starts.iter().map(|(at, _)| *at).collect()
    }

    /// Payloads of every match-descriptor request sent so far.
    pub fn sent_queries(&self) -> Vec<Vec<u8>> {
        self.queries.iter().map(|(_, frame)| frame.clone()).collect()
    }

    pub fn query_times(&self) -> Vec<Duration> {
        self.queries.iter().map(|(at, _)| *at).collect()
    }

    /// Take the buffer of the oldest query the stack still holds.
    pub fn take_in_flight_query(&mut self) -> Option<BufRef> {
        self.in_flight.pop_front()
    }

    pub fn in_flight_queries(&self) -> usize {
        self.in_flight.len()
    }

    pub fn sent_zcl(&self) -> Vec<(ZclTarget, Vec<u8>)> {
        self.zcl.clone()
    }

    pub fn rx_on_when_idle(&self) -> Option<bool> {
        self.rx_on_when_idle
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps
    }

    // board

    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.indicators.get(&indicator).copied().unwrap_or(false)
    }

    pub fn press_button(&mut self, button: ButtonId) {
        self.pressed.insert(button);
    }

    pub fn release_button(&mut self, button: ButtonId) {
        self.pressed.remove(&button);
    }
}

impl BufferPool for MockPlatform {
    fn alloc(&mut self) -> Option<BufRef> {
        self.lease()
    }

    fn alloc_delayed(&mut self, purpose: TimerPurpose) -> Result<(), BufferError> {
        match self.lease() {
            Some(buf) => {
                self.schedule(purpose, Duration::ZERO, Some(buf));
            }
            None => self.waiters.push_back(purpose),
        }
        Ok(())
    }

    fn release(&mut self, buf: BufRef) {
        let index = usize::from(buf.into_raw());
        let slot = self
            .slots
            .get_mut(index)
            .unwrap_or_else(|| panic!("release of unknown buffer #{index}"));
        assert!(slot.leased, "buffer #{index} released twice");
        slot.leased = false;
        slot.data.clear();
        self.released += 1;

        // a waiter whose timer was re-armed meanwhile no longer wants a buffer
        while let Some(purpose) = self.waiters.pop_front() {
            if self.timers.contains_key(&purpose) {
                continue;
            }
            if let Some(buf) = self.lease() {
                self.schedule(purpose, Duration::ZERO, Some(buf));
            }
            break;
        }
    }

    fn initial_alloc(&mut self, buf: &BufRef, size: usize) -> Result<&mut [u8], BufferError> {
        let capacity = self.buffer_size;
        if size > capacity {
            return Err(BufferError::PayloadTooLarge {
                requested: size,
                capacity,
            });
        }
        let slot = self.slot_mut(buf)?;
        slot.data.clear();
        slot.data.resize(size, 0);
        Ok(&mut slot.data[..])
    }

    fn payload(&self, buf: &BufRef) -> &[u8] {
        self.slots
            .get(usize::from(buf.index()))
            .map(|slot| slot.data.as_slice())
            .unwrap_or(&[])
    }
}

impl Scheduler for MockPlatform {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule(
        &mut self,
        purpose: TimerPurpose,
        delay: Duration,
        buf: Option<BufRef>,
    ) -> TimerHandle {
        assert!(
            !self.timers.contains_key(&purpose),
            "second {purpose} timer armed while one is pending"
        );
        self.generation += 1;
        self.timers.insert(
            purpose,
            PendingTimer {
                due: self.now + delay,
                delay,
                generation: self.generation,
                buf,
            },
        );
        TimerHandle {
            purpose,
            generation: self.generation,
        }
    }

    fn cancel(&mut self, purpose: TimerPurpose) -> Option<BufRef> {
        let timer = self.timers.remove(&purpose)?;
        *self.cancels.entry(purpose).or_default() += 1;
        timer.buf
    }

    fn is_pending(&self, purpose: TimerPurpose) -> bool {
        self.timers.contains_key(&purpose)
    }
}

impl RadioStack for MockPlatform {
    fn is_factory_new(&self) -> bool {
        self.factory_new
    }

    fn start_commissioning(&mut self, mode: CommissioningMode) -> bool {
        if self.stack_busy {
            return false;
        }
        self.starts.push((self.now, mode));
        true
    }

    fn set_rx_on_when_idle(&mut self, rx_on: bool) {
        self.rx_on_when_idle = Some(rx_on);
    }

    fn sleep_now(&mut self) {
        self.sleeps += 1;
    }

    fn send_match_desc(&mut self, buf: BufRef) -> Result<(), SendError> {
        if self.reject_sends {
            return Err(SendError {
                buf,
                reason: StackError::QueueFull,
            });
        }
        let frame = self.payload(&buf).to_vec();
        self.queries.push((self.now, frame));
        self.in_flight.push_back(buf);
        Ok(())
    }

    fn send_zcl(&mut self, buf: BufRef, target: ZclTarget) -> Result<(), SendError> {
        if self.reject_sends {
            return Err(SendError {
                buf,
                reason: StackError::QueueFull,
            });
        }
        let frame = self.payload(&buf).to_vec();
        self.zcl.push((target, frame));
        self.release(buf);
        Ok(())
    }
}

impl Board for MockPlatform {
    fn set_indicator(&mut self, indicator: Indicator, on: bool) {
        self.indicators.insert(indicator, on);
    }

    fn is_button_pressed(&self, button: ButtonId) -> bool {
        self.pressed.contains(&button)
    }
}

/// An engine and its mock platform, driven in virtual time.
#[derive(Debug, Default)]
pub struct Harness {
    pub ctx: NodeContext,
    pub platform: MockPlatform,
}

impl Harness {
    pub fn new(settings: NodeSettings) -> Self {
        Self {
            ctx: NodeContext::new(settings),
            platform: MockPlatform::new(),
        }
    }

    /// Boot: read the sleepy button, then deliver skip-startup.
    pub fn boot(&mut self) {
        commissioning::configure_sleep(&mut self.ctx, &mut self.platform);
        self.signal(SignalTag::SkipStartup, Status::OK, &[]);
    }

    /// Deliver a stack signal carrying `payload` in a fresh buffer.
    pub fn signal(&mut self, tag: SignalTag, status: Status, payload: &[u8]) {
        let buf = self.platform.alloc().expect("pool exhausted in test");
        self.platform
            .write_payload(&buf, payload)
            .expect("payload fits in a buffer");
        dispatch::on_signal(&mut self.ctx, &mut self.platform, tag.to_u16(), status, Some(buf));
    }

    /// Move virtual time forward by `by`, firing every timer that falls due.
    pub fn advance(&mut self, by: Duration) {
        let until = self.platform.now() + by;
        while let Some((due, purpose)) = self.platform.next_expiry() {
            if due > until {
                break;
            }
            self.platform.set_now(due);
            let buf = self.platform.fire(purpose);
            dispatch::on_timer(&mut self.ctx, &mut self.platform, purpose, buf);
        }
        self.platform.set_now(until);
    }

    /// Answer the oldest in-flight query, reusing its buffer for the response.
    ///
    /// Returns `false` if no query is in flight.
    pub fn respond_to_query(&mut self, src: ShortAddr, status: u8, endpoints: &[Endpoint]) -> bool {
        let Some(buf) = self.platform.take_in_flight_query() else {
            return false;
        };
        self.platform
            .write_payload(&buf, &match_response(src, status, endpoints))
            .expect("response fits in a buffer");
        dispatch::on_signal(
            &mut self.ctx,
            &mut self.platform,
            SignalTag::MatchDescResponse.to_u16(),
            Status::OK,
            Some(buf),
        );
        true
    }

    /// Deliver a response in a fresh buffer, whether or not a query is in flight.
    pub fn deliver_response(&mut self, src: ShortAddr, status: u8, endpoints: &[Endpoint]) {
        let payload = match_response(src, status, endpoints);
        self.signal(SignalTag::MatchDescResponse, Status::OK, &payload);
    }

    /// The stack gives up on every query nobody answered.
    pub fn expire_unanswered_queries(&mut self) {
        while let Some(buf) = self.platform.take_in_flight_query() {
            self.platform.release(buf);
        }
    }

    /// Cancel every timer and drop in-flight queries, returning their buffers.
    pub fn quiesce(&mut self) {
        self.expire_unanswered_queries();
        for purpose in TimerPurpose::ALL {
            timer::disarm(&mut self.platform, purpose);
        }
    }

    pub fn press(&mut self, button: ButtonId) {
        self.platform.press_button(button);
        dispatch::on_button(&mut self.ctx, &mut self.platform, ButtonEvent::pressed(button));
    }

    pub fn release(&mut self, button: ButtonId) {
        self.platform.release_button(button);
        dispatch::on_button(&mut self.ctx, &mut self.platform, ButtonEvent::released(button));
    }
}

fn match_response(src: ShortAddr, status: u8, endpoints: &[Endpoint]) -> Vec<u8> {
    MatchDescResponse {
        src_addr: src,
        status,
        addr_of_interest: src,
        endpoints: endpoints.to_vec(),
    }
    .encode()
}

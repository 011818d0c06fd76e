//! Fixed-size message buffer pool.
//!
//! Slots are allocated once at startup and leased out by index. A slot's
//! payload is reset on every lease, so a stale frame never leaks into the
//! next user of the buffer.

use std::collections::VecDeque;

use meshcomm_commissioning::{BufferError, TimerPurpose};
use meshcomm_core::BufRef;

#[derive(Debug, Default)]
struct Slot {
    leased: bool,
    data: Vec<u8>,
}

/// A slab of equally sized buffers plus the queue of delayed allocations
/// waiting for one to come free.
#[derive(Debug)]
pub struct SlabPool {
    slots: Vec<Slot>,
    buffer_size: usize,
    waiters: VecDeque<TimerPurpose>,
}

impl SlabPool {
    /// Create a pool of `count` buffers holding `buffer_size` bytes each.
    ///
    /// `count` is clamped to 256, the number of distinct buffer ids.
    pub fn new(count: usize, buffer_size: usize) -> Self {
        let count = count.min(usize::from(u8::MAX) + 1);
        Self {
            slots: (0..count)
                .map(|_| Slot {
                    leased: false,
                    data: Vec::with_capacity(buffer_size),
                })
                .collect(),
            buffer_size,
            waiters: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers currently leased.
    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|slot| slot.leased).count()
    }

    /// Lease the lowest free slot.
    pub fn alloc(&mut self) -> Option<BufRef> {
        let index = self.slots.iter().position(|slot| !slot.leased)?;
        let index = u8::try_from(index).ok()?;
        let slot = &mut self.slots[usize::from(index)];
        slot.leased = true;
        slot.data.clear();
        Some(BufRef::from_raw(index))
    }

    /// Return a lease. Fails for a slot that isn't leased.
    pub fn release(&mut self, buf: BufRef) -> Result<(), BufferError> {
        let index = buf.into_raw();
        let slot = self
            .slots
            .get_mut(usize::from(index))
            .filter(|slot| slot.leased)
            .ok_or(BufferError::UnknownBuffer(index))?;
        slot.leased = false;
        slot.data.clear();
        Ok(())
    }

    pub fn initial_alloc(&mut self, buf: &BufRef, size: usize) -> Result<&mut [u8], BufferError> {
        if size > self.buffer_size {
            return Err(BufferError::PayloadTooLarge {
                requested: size,
                capacity: self.buffer_size,
            });
        }
        let slot = self
            .slots
            .get_mut(usize::from(buf.index()))
            .filter(|slot| slot.leased)
            .ok_or(BufferError::UnknownBuffer(buf.index()))?;
        slot.data.clear();
        slot.data.resize(size, 0);
        Ok(&mut slot.data[..])
    }

    pub fn payload(&self, buf: &BufRef) -> &[u8] {
        self.slots
            .get(usize::from(buf.index()))
            .map(|slot| slot.data.as_slice())
            .unwrap_or(&[])
    }

    /// Queue a delayed allocation. At most one waiter per buffer is kept.
    pub fn push_waiter(&mut self, purpose: TimerPurpose) -> Result<(), BufferError> {
        if self.waiters.len() >= self.slots.len() {
            return Err(BufferError::Exhausted);
        }
        self.waiters.push_back(purpose);
        Ok(())
    }

    pub fn pop_waiter(&mut self) -> Option<TimerPurpose> {
        self.waiters.pop_front()
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}

//! Opaque reference to a leased stack message buffer.
//!
//! The stack owns a fixed pool of message buffers and hands them out by
//! index. A [`BufRef`] is a lease on one of them: it is neither `Clone` nor
//! `Copy`, so moving it is the only way to pass ownership on, and giving it
//! back to the pool consumes it. A lease dropped on the floor is a leak,
//! which is why the type is `#[must_use]`.

use core::fmt;

#[must_use = "a leased buffer must be forwarded or released back to the pool"]
#[derive(PartialEq, Eq, Hash)]
pub struct BufRef(u8);

impl BufRef {
    /// Wrap a pool slot index.
    ///
    /// Only buffer pool implementations should mint references.
    pub const fn from_raw(index: u8) -> Self {
        Self(index)
    }

    /// The pool slot index this reference leases.
    pub const fn index(&self) -> u8 {
        self.0
    }

    /// Give up the lease and return the slot index.
    ///
    /// Pool implementations call this inside `release`.
    pub const fn into_raw(self) -> u8 {
        self.0
    }
}

impl fmt::Debug for BufRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufRef(#{})", self.0)
    }
}

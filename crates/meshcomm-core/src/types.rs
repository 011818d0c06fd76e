//! Newtype wrappers for addressing and identifier fields.
//!
//! Network addresses, endpoints, cluster and profile identifiers are all
//! small integers on the wire. The wrappers keep them from being mixed up.

use core::fmt;

use crate::constants::RET_OK;

/// A 16-bit network (short) address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortAddr(pub(crate) u16);

impl ShortAddr {
    pub const fn new(addr: u16) -> Self {
        Self(addr)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Whether this is one of the reserved broadcast addresses (0xFFF8..=0xFFFF).
    pub const fn is_broadcast(self) -> bool {
        self.0 >= 0xFFF8
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}

impl fmt::Display for ShortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl fmt::Debug for ShortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortAddr(0x{:04x})", self.0)
    }
}

/// An application endpoint on a device (1..=240 for application use).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(pub(crate) u8);

impl Endpoint {
    pub const fn new(ep: u8) -> Self {
        Self(ep)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cluster identifier (a named capability exposed at an endpoint).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub(crate) u16);

impl ClusterId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl fmt::Debug for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClusterId(0x{:04x})", self.0)
    }
}

/// An application profile identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileId(pub(crate) u16);

impl ProfileId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileId(0x{:04x})", self.0)
    }
}

/// A 64-bit IEEE (extended) address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IeeeAddr(pub(crate) [u8; 8]);

impl IeeeAddr {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for IeeeAddr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Displayed most significant byte first, colon separated, as printed on device labels.
impl fmt::Display for IeeeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().rev().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for IeeeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IeeeAddr({self})")
    }
}

/// Return code attached to a stack signal. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(RET_OK);

    pub const fn is_ok(self) -> bool {
        self.0 == RET_OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Commissioning and peer discovery engine for a mesh network node.
//!
//! The engine is a set of run-to-completion transition functions over a
//! single [`NodeContext`]. The network stack, timer service, buffer pool and
//! board I/O are reached through the traits in [`platform`]; every ingress
//! (stack signal, timer expiry, button event) enters through [`dispatch`].

pub mod commissioning;
pub mod context;
pub mod control;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod platform;
pub mod settings;
pub mod timer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::{ButtonState, CommissioningState, DiscoveredPeer, NodeContext};
pub use dispatch::{ButtonAction, ButtonEvent, Event, Route, handle_event, on_button, on_signal, on_timer};
pub use error::{BufferError, SendError, StackError};
pub use platform::{
    Board, BufferPool, ButtonId, CommissioningMode, Indicator, Platform, RadioStack, Scheduler,
    ZclTarget,
};
pub use settings::{NodeRole, NodeSettings, Timing};
pub use timer::{TimerHandle, TimerPurpose};

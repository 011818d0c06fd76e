//! Commissioning state machine.
//!
//! ```text
//! Uninitialized ──boot──> Forming / Joining ──> SteeringInProgress ──ok──> Joined
//!                                                   ^    |                   |
//!                               retry after delay   |    fail                leave
//!                                                   |    v                   v
//!                                              SteeringFailed              Left
//! ```
//!
//! Failures never terminate the machine: they schedule a
//! [`TimerPurpose::SteeringRestart`] after the fixed retry delay, forever.
//! A leave only triggers an automatic rejoin when the leave type says the
//! stack won't come back by itself; otherwise the node waits for the retry
//! button.

use meshcomm_core::signal::LeaveParams;
use meshcomm_core::{BufRef, Status};

use crate::context::{CommissioningState, NodeContext};
use crate::discovery;
use crate::platform::{CommissioningMode, Indicator, Platform};
use crate::timer::{self, TimerPurpose};

/// Read the sleepy button once at boot and configure the radio accordingly.
pub fn configure_sleep<P: Platform>(ctx: &mut NodeContext, p: &mut P) {
    let sleepy = p.is_button_pressed(ctx.settings.buttons.sleepy);
    ctx.sleep_capable = sleepy;
    p.set_rx_on_when_idle(!sleepy);
    tracing::info!(sleepy, "sleepy device behaviour configured");
}

/// The stack is up; pick the initial commissioning procedure.
pub fn on_skip_startup<P: Platform>(ctx: &mut NodeContext, p: &mut P) {
    if ctx.state != CommissioningState::Uninitialized {
        tracing::warn!(state = ctx.state.as_str(), "skip-startup after boot, ignoring");
        return;
    }

    let mode = if p.is_factory_new() {
        if ctx.settings.role.forms_network() {
            tracing::info!("start network steering and formation");
            CommissioningMode::SteeringAndFormation
        } else {
            tracing::info!("start network steering");
            CommissioningMode::NetworkSteering
        }
    } else {
        tracing::info!("resume from stored network credentials");
        CommissioningMode::Initialization
    };

    if !start(ctx, p, mode) {
        tracing::error!(?mode, "stack refused initial commissioning");
    }
}

/// First start after a factory reset finished (network formed or joined).
pub fn on_first_start<P: Platform>(ctx: &mut NodeContext, p: &mut P, status: Status) {
    if !status.is_ok() {
        tracing::error!(%status, "failed to form network");
        schedule_retry(ctx, p);
        return;
    }

    if ctx.settings.manual_steering {
        tracing::info!("network started, waiting for manual steering");
        ctx.transition(CommissioningState::Joined);
        p.set_indicator(Indicator::Network, true);
        return;
    }

    tracing::info!("start network steering");
    if !start(ctx, p, CommissioningMode::NetworkSteering) {
        // steering was already part of the running procedure
        tracing::debug!("steering already running");
    }
}

/// Formation finished.
pub fn on_formation<P: Platform>(ctx: &mut NodeContext, p: &mut P, status: Status) {
    if status.is_ok() {
        tracing::info!("network formed");
    } else {
        tracing::warn!(%status, "network formation failed, retrying");
        schedule_retry(ctx, p);
    }
}

/// Steering finished. May take `buf` to start discovery.
pub fn on_steering<P: Platform>(
    ctx: &mut NodeContext,
    p: &mut P,
    status: Status,
    buf: Option<BufRef>,
) -> Option<BufRef> {
    if !status.is_ok() {
        tracing::info!(%status, "network steering failed, retrying");
        schedule_retry(ctx, p);
        return buf;
    }

    tracing::info!("network steering started");
    ctx.transition(CommissioningState::Joined);
    p.set_indicator(Indicator::Network, true);
    timer::arm(
        p,
        TimerPurpose::CommissioningWindow,
        ctx.settings.timing.commissioning_window,
        None,
    );

    if discovery::is_running(p) {
        return buf;
    }
    maybe_start_discovery(ctx, p, buf)
}

/// Initialization from stored credentials finished. May take `buf` to start discovery.
pub fn on_reboot<P: Platform>(
    ctx: &mut NodeContext,
    p: &mut P,
    status: Status,
    buf: Option<BufRef>,
) -> Option<BufRef> {
    if !status.is_ok() {
        tracing::error!(%status, "device startup failed, retrying");
        schedule_retry(ctx, p);
        return buf;
    }

    tracing::info!("joined network");
    ctx.transition(CommissioningState::Joined);
    p.set_indicator(Indicator::Network, true);

    if discovery::is_running(p) {
        return buf;
    }
    maybe_start_discovery(ctx, p, buf)
}

/// The node left the network.
pub fn on_leave<P: Platform>(
    ctx: &mut NodeContext,
    p: &mut P,
    status: Status,
    params: Option<LeaveParams>,
) {
    let Some(params) = params.filter(|_| status.is_ok()) else {
        tracing::error!(%status, "unable to leave network");
        return;
    };

    tracing::info!(leave_type = ?params.leave_type, "network left");
    p.set_indicator(Indicator::Network, false);
    timer::disarm(p, TimerPurpose::CommissioningWindow);
    ctx.transition(CommissioningState::Left);

    if params.leave_type.requires_rejoin() {
        if !start(ctx, p, CommissioningMode::NetworkSteering) {
            tracing::warn!("stack refused rejoin");
        }
    } else {
        tracing::info!("waiting for stack rejoin or manual retry");
    }
}

/// Manual retry requested from the board.
///
/// Returns whether commissioning was restarted. Asking while a procedure
/// is running is a no-op.
pub fn on_retry_button<P: Platform>(ctx: &mut NodeContext, p: &mut P) -> bool {
    if ctx.state.is_commissioning() {
        tracing::info!("top level commissioning hasn't finished yet");
        return false;
    }

    timer::disarm(p, TimerPurpose::SteeringRestart);
    let mode = restart_mode(ctx, p);
    if start(ctx, p, mode) {
        tracing::info!("top level commissioning restarted");
        true
    } else {
        tracing::info!("top level commissioning hasn't finished yet");
        false
    }
}

/// The retry delay after a failure elapsed.
pub fn on_steering_restart<P: Platform>(ctx: &mut NodeContext, p: &mut P) {
    let mode = restart_mode(ctx, p);
    if !start(ctx, p, mode) {
        tracing::debug!("commissioning retry refused, procedure still running");
    }
}

/// The commissioning window closed; purely informational.
pub fn on_commissioning_window_closed<P: Platform>(_ctx: &mut NodeContext, p: &mut P) {
    tracing::info!("network steering finished");
    p.set_indicator(Indicator::Network, false);
}

/// The stack offers a sleep opportunity.
pub fn on_can_sleep<P: Platform>(ctx: &mut NodeContext, p: &mut P, sleep_ms: u32) {
    if ctx.sleep_capable {
        tracing::debug!(sleep_ms, "sleeping");
        p.sleep_now();
    } else {
        tracing::trace!(sleep_ms, "sleep offer ignored, node is not sleepy");
    }
}

fn maybe_start_discovery<P: Platform>(
    ctx: &mut NodeContext,
    p: &mut P,
    buf: Option<BufRef>,
) -> Option<BufRef> {
    if !ctx.settings.controller || ctx.peer.is_recorded() {
        return buf;
    }
    discovery::start(ctx, p, buf);
    None
}

fn restart_mode<P: Platform>(ctx: &NodeContext, p: &P) -> CommissioningMode {
    if p.is_factory_new() && ctx.settings.role.forms_network() {
        CommissioningMode::SteeringAndFormation
    } else {
        CommissioningMode::NetworkSteering
    }
}

fn start<P: Platform>(ctx: &mut NodeContext, p: &mut P, mode: CommissioningMode) -> bool {
    if !p.start_commissioning(mode) {
        return false;
    }
    ctx.transition(match mode {
        CommissioningMode::SteeringAndFormation => CommissioningState::Forming,
        CommissioningMode::Initialization => CommissioningState::Joining,
        CommissioningMode::NetworkSteering => {
            if ctx.state == CommissioningState::Uninitialized {
                CommissioningState::Joining
            } else {
                CommissioningState::SteeringInProgress
            }
        }
    });
    true
}

fn schedule_retry<P: Platform>(ctx: &mut NodeContext, p: &mut P) {
    ctx.transition(CommissioningState::SteeringFailed);
    p.set_indicator(Indicator::Network, false);
    timer::arm(
        p,
        TimerPurpose::SteeringRestart,
        ctx.settings.timing.retry_delay,
        None,
    );
}

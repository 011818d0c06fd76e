//! Ingress for stack signals, timer expiries and button events.
//!
//! Every entry point takes ownership of the buffer it is handed. Handlers
//! that reuse the buffer keep it; anything a handler gives back is released
//! here, so each buffer leaves the engine exactly once.

use meshcomm_core::{BufRef, Signal, Status};

use crate::commissioning;
use crate::context::NodeContext;
use crate::control;
use crate::discovery;
use crate::platform::{ButtonId, Platform};
use crate::timer::TimerPurpose;

/// Which part of the engine a signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Skip-startup, first start, reboot, formation.
    NetworkBringUp,
    SteeringResult,
    Leave,
    PeerAnnouncement,
    PowerManagement,
    ProductionConfig,
    DiscoveryResponse,
    Unhandled,
}

impl Route {
    pub fn of(signal: &Signal) -> Route {
        match signal {
            Signal::SkipStartup
            | Signal::DeviceFirstStart
            | Signal::DeviceReboot
            | Signal::Formation => Route::NetworkBringUp,
            Signal::Steering => Route::SteeringResult,
            Signal::Leave(_) => Route::Leave,
            Signal::DeviceAnnounce(_) => Route::PeerAnnouncement,
            Signal::CanSleep { .. } => Route::PowerManagement,
            Signal::ProductionConfigReady => Route::ProductionConfig,
            Signal::MatchDescResponse(_) => Route::DiscoveryResponse,
            Signal::Unknown(_) => Route::Unhandled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub action: ButtonAction,
}

impl ButtonEvent {
    pub fn pressed(button: ButtonId) -> Self {
        Self {
            button,
            action: ButtonAction::Pressed,
        }
    }

    pub fn released(button: ButtonId) -> Self {
        Self {
            button,
            action: ButtonAction::Released,
        }
    }
}

/// One unit of work for the engine.
#[derive(Debug)]
pub enum Event {
    Signal {
        tag: u16,
        status: Status,
        buf: Option<BufRef>,
    },
    Timer {
        purpose: TimerPurpose,
        buf: Option<BufRef>,
    },
    Button(ButtonEvent),
}

pub fn handle_event<P: Platform>(ctx: &mut NodeContext, p: &mut P, event: Event) {
    match event {
        Event::Signal { tag, status, buf } => on_signal(ctx, p, tag, status, buf),
        Event::Timer { purpose, buf } => on_timer(ctx, p, purpose, buf),
        Event::Button(event) => on_button(ctx, p, event),
    }
}

/// Handle a stack signal. Never fails: undecodable or unknown signals are
/// logged and their buffer released.
pub fn on_signal<P: Platform>(
    ctx: &mut NodeContext,
    p: &mut P,
    tag: u16,
    status: Status,
    buf: Option<BufRef>,
) {
    let payload = buf.as_ref().map(|buf| p.payload(buf)).unwrap_or(&[]);
    let signal = match Signal::decode(tag, status, payload) {
        Ok(signal) => signal,
        Err(err) => {
            tracing::warn!(tag, %status, %err, "undecodable signal");
            release(p, buf);
            return;
        }
    };

    tracing::debug!(tag, %status, route = ?Route::of(&signal), "signal");
    let leftover = route_signal(ctx, p, signal, status, buf);
    release(p, leftover);
}

fn route_signal<P: Platform>(
    ctx: &mut NodeContext,
    p: &mut P,
    signal: Signal,
    status: Status,
    buf: Option<BufRef>,
) -> Option<BufRef> {
    match signal {
        Signal::SkipStartup => {
            commissioning::on_skip_startup(ctx, p);
            buf
        }
        Signal::DeviceFirstStart => {
            commissioning::on_first_start(ctx, p, status);
            buf
        }
        Signal::DeviceReboot => commissioning::on_reboot(ctx, p, status, buf),
        Signal::Formation => {
            commissioning::on_formation(ctx, p, status);
            buf
        }
        Signal::Steering => commissioning::on_steering(ctx, p, status, buf),
        Signal::Leave(params) => {
            commissioning::on_leave(ctx, p, status, params);
            buf
        }
        Signal::DeviceAnnounce(announce) => {
            tracing::info!(
                short_addr = %announce.short_addr,
                ieee_addr = %announce.ieee_addr,
                "new device commissioned or rejoined"
            );
            buf
        }
        Signal::CanSleep { sleep_ms } => {
            commissioning::on_can_sleep(ctx, p, sleep_ms);
            buf
        }
        Signal::ProductionConfigReady => {
            if !status.is_ok() {
                tracing::warn!(%status, "production config is not present or invalid");
            }
            buf
        }
        Signal::MatchDescResponse(response) => {
            discovery::on_response(ctx, p, &response);
            buf
        }
        Signal::Unknown(tag) => {
            tracing::info!(tag, %status, "unhandled signal");
            buf
        }
    }
}

/// Handle a timer expiry of `purpose`, with the buffer it was armed with.
pub fn on_timer<P: Platform>(
    ctx: &mut NodeContext,
    p: &mut P,
    purpose: TimerPurpose,
    buf: Option<BufRef>,
) {
    tracing::trace!(%purpose, "timer fired");
    match purpose {
        TimerPurpose::DiscoveryQuery => discovery::on_query_timer(ctx, p, buf),
        TimerPurpose::DiscoveryTimeout => discovery::on_timeout(ctx, p, buf),
        TimerPurpose::SteeringRestart => {
            release(p, buf);
            commissioning::on_steering_restart(ctx, p);
        }
        TimerPurpose::CommissioningWindow => {
            release(p, buf);
            commissioning::on_commissioning_window_closed(ctx, p);
        }
        TimerPurpose::ButtonPoll => {
            release(p, buf);
            control::on_poll(ctx, p);
        }
    }
}

pub fn on_button<P: Platform>(ctx: &mut NodeContext, p: &mut P, event: ButtonEvent) {
    let ButtonEvent { button, action } = event;
    if button == ctx.settings.buttons.retry {
        if action == ButtonAction::Pressed {
            commissioning::on_retry_button(ctx, p);
        }
    } else if control::is_light_button(ctx, button) {
        match action {
            ButtonAction::Pressed => control::on_press(ctx, p, button),
            ButtonAction::Released => control::on_release(ctx, p, button),
        }
    } else {
        tracing::debug!(button = button.0, ?action, "unhandled button event");
    }
}

fn release<P: Platform>(p: &mut P, buf: Option<BufRef>) {
    if let Some(buf) = buf {
        p.release(buf);
    }
}

//! Light control through the on/off buttons.
//!
//! A short press switches the peer on or off. Holding a button past the
//! long-press threshold dims instead, sending one level step per long poll
//! period until the button is released.

use meshcomm_core::zcl::{StepMode, ZclCommand};

use crate::context::NodeContext;
use crate::error::{BufferError, SendError};
use crate::platform::{ButtonId, Platform, ZclTarget};
use crate::timer::{self, TimerPurpose};

/// Whether `button` is one of the light buttons.
pub fn is_light_button(ctx: &NodeContext, button: ButtonId) -> bool {
    button == ctx.settings.buttons.light_on || button == ctx.settings.buttons.light_off
}

pub fn on_press<P: Platform>(ctx: &mut NodeContext, p: &mut P, button: ButtonId) {
    if !ctx.peer.is_recorded() {
        tracing::info!(button = button.0, "no peer to control yet");
        return;
    }
    ctx.button.press(button, p.now());
    timer::arm(
        p,
        TimerPurpose::ButtonPoll,
        ctx.settings.timing.button_short_poll,
        None,
    );
}

pub fn on_release<P: Platform>(ctx: &mut NodeContext, p: &mut P, button: ButtonId) {
    if !ctx.button.held || ctx.button.button != Some(button) {
        return;
    }
    let held_for = ctx.button.held_for(p.now());
    timer::disarm(p, TimerPurpose::ButtonPoll);
    ctx.button.release();

    // long presses already dimmed while held
    if held_for < ctx.settings.timing.long_press_threshold {
        let command = if button == ctx.settings.buttons.light_on {
            ZclCommand::On
        } else {
            ZclCommand::Off
        };
        send_command(ctx, p, command);
    }
}

/// The button poll timer fired.
pub fn on_poll<P: Platform>(ctx: &mut NodeContext, p: &mut P) {
    let Some(button) = ctx.button.button.filter(|_| ctx.button.held) else {
        return;
    };

    let timing = &ctx.settings.timing;
    if ctx.button.held_for(p.now()) < timing.long_press_threshold {
        let delay = timing.button_short_poll;
        timer::arm(p, TimerPurpose::ButtonPoll, delay, None);
        return;
    }

    let delay = timing.button_long_poll;
    let mode = if button == ctx.settings.buttons.light_on {
        StepMode::Up
    } else {
        StepMode::Down
    };
    let command = ZclCommand::LevelStep {
        mode,
        step_size: ctx.settings.dim_step,
        transition_time: ctx.settings.dim_transition_time,
    };
    send_command(ctx, p, command);
    timer::arm(p, TimerPurpose::ButtonPoll, delay, None);
}

/// Send `command` to the recorded peer. Returns whether the stack accepted it.
pub fn send_command<P: Platform>(ctx: &mut NodeContext, p: &mut P, command: ZclCommand) -> bool {
    let Some((dst_addr, dst_endpoint)) = ctx.peer.get() else {
        tracing::info!(?command, "no peer, dropping command");
        return false;
    };
    let Some(buf) = p.alloc() else {
        tracing::warn!(?command, "buffer pool exhausted, dropping command");
        return false;
    };

    let seq = ctx.next_zcl_seq();
    let written = p
        .initial_alloc(&buf, command.encoded_len())
        .and_then(|out| command.encode_into(seq, out).map_err(BufferError::from));
    if let Err(err) = written {
        tracing::warn!(%err, ?command, "unable to build command");
        p.release(buf);
        return false;
    }

    let target = ZclTarget {
        dst_addr,
        dst_endpoint,
        src_endpoint: ctx.settings.local_endpoint,
        profile: ctx.settings.discovery.profile,
        cluster: command.cluster(),
    };
    match p.send_zcl(buf, target) {
        Ok(()) => {
            tracing::debug!(?command, seq, dst = %dst_addr, "command sent");
            true
        }
        Err(SendError { buf, reason }) => {
            tracing::warn!(%reason, ?command, "command not sent");
            p.release(buf);
            false
        }
    }
}

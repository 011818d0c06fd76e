//! End-to-end commissioning flows against the mock platform.

use std::time::Duration;

use meshcomm_commissioning::testing::Harness;
use meshcomm_commissioning::{
    ButtonId, CommissioningMode, CommissioningState, Indicator, NodeRole, NodeSettings, Scheduler,
    TimerPurpose,
};
use meshcomm_core::signal::{LeaveParams, LeaveType, encode_leave};
use meshcomm_core::{IeeeAddr, SignalTag, Status};
use proptest::prelude::*;

const FAIL: Status = Status(-1);
const RETRY_DELAY: Duration = Duration::from_secs(1);

fn joiner() -> Harness {
    Harness::new(NodeSettings {
        role: NodeRole::Router,
        controller: false,
        ..NodeSettings::default()
    })
}

fn leave_payload(leave_type: LeaveType) -> Vec<u8> {
    encode_leave(&LeaveParams {
        device: IeeeAddr::new([0xf4, 0xce, 0x36, 0, 0, 0, 0, 1]),
        leave_type,
    })
    .to_vec()
}

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------

#[test]
fn first_steering_attempt_succeeds() {
    let mut h = joiner();
    h.boot();
    assert_eq!(h.platform.commissioning_starts(), vec![CommissioningMode::NetworkSteering]);
    assert!(!h.platform.indicator(Indicator::Network));

    h.signal(SignalTag::Steering, Status::OK, &[]);

    assert_eq!(h.ctx.state, CommissioningState::Joined);
    assert!(h.platform.indicator(Indicator::Network));
    assert!(!h.platform.is_pending(TimerPurpose::SteeringRestart));
}

#[test]
fn steering_fails_twice_then_succeeds() {
    let mut h = joiner();
    h.boot();

    for _ in 0..2 {
        h.signal(SignalTag::Steering, FAIL, &[]);
        assert_eq!(h.ctx.state, CommissioningState::SteeringFailed);
        assert!(!h.platform.indicator(Indicator::Network));
        h.advance(RETRY_DELAY);
    }
    h.signal(SignalTag::Steering, Status::OK, &[]);

    assert_eq!(h.platform.commissioning_starts().len(), 3);
    assert_eq!(
        h.platform.commissioning_start_times(),
        vec![Duration::ZERO, RETRY_DELAY, RETRY_DELAY * 2]
    );
    assert_eq!(h.ctx.state, CommissioningState::Joined);
    assert!(h.platform.indicator(Indicator::Network));
}

#[test]
fn commissioning_window_clears_indicator() {
    let mut h = joiner();
    h.boot();
    h.signal(SignalTag::Steering, Status::OK, &[]);

    h.advance(Duration::from_secs(179));
    assert!(h.platform.indicator(Indicator::Network));
    h.advance(Duration::from_secs(1));
    assert!(!h.platform.indicator(Indicator::Network));
    // informational only
    assert_eq!(h.ctx.state, CommissioningState::Joined);
}

#[test]
fn coordinator_forms_then_opens_network() {
    let mut h = Harness::new(NodeSettings {
        controller: false,
        ..NodeSettings::default()
    });
    h.boot();
    assert_eq!(h.ctx.state, CommissioningState::Forming);

    h.signal(SignalTag::Formation, Status::OK, &[]);
    h.signal(SignalTag::DeviceFirstStart, Status::OK, &[]);
    h.signal(SignalTag::Steering, Status::OK, &[]);

    assert_eq!(
        h.platform.commissioning_starts(),
        vec![CommissioningMode::SteeringAndFormation, CommissioningMode::NetworkSteering]
    );
    assert_eq!(h.ctx.state, CommissioningState::Joined);
}

#[test]
fn stored_credentials_rejoin_through_reboot() {
    let mut h = joiner();
    h.platform.set_factory_new(false);
    h.boot();
    assert_eq!(h.platform.commissioning_starts(), vec![CommissioningMode::Initialization]);

    h.signal(SignalTag::DeviceReboot, Status::OK, &[]);
    assert_eq!(h.ctx.state, CommissioningState::Joined);
    assert!(h.platform.indicator(Indicator::Network));
}

#[test]
fn failed_reboot_retries_with_steering() {
    let mut h = joiner();
    h.platform.set_factory_new(false);
    h.boot();
    h.signal(SignalTag::DeviceReboot, FAIL, &[]);
    h.advance(RETRY_DELAY);

    assert_eq!(
        h.platform.commissioning_starts(),
        vec![CommissioningMode::Initialization, CommissioningMode::NetworkSteering]
    );
    assert_eq!(h.ctx.state, CommissioningState::SteeringInProgress);
}

// ---------------------------------------------------------------------------
// Leave
// ---------------------------------------------------------------------------

#[test]
fn leave_requiring_rejoin_restarts_immediately() {
    let mut h = joiner();
    h.boot();
    h.signal(SignalTag::Steering, Status::OK, &[]);
    let before = h.platform.commissioning_starts().len();

    h.signal(SignalTag::Leave, Status::OK, &leave_payload(LeaveType::Reset));

    let starts = h.platform.commissioning_start_times();
    assert_eq!(starts.len(), before + 1);
    assert_eq!(*starts.last().unwrap(), h.platform.now());
    assert_eq!(h.ctx.state, CommissioningState::SteeringInProgress);
    assert!(!h.platform.indicator(Indicator::Network));
}

#[test]
fn leave_without_rejoin_waits_for_button() {
    let mut h = joiner();
    h.boot();
    h.signal(SignalTag::Steering, Status::OK, &[]);
    let before = h.platform.commissioning_starts().len();

    h.signal(SignalTag::Leave, Status::OK, &leave_payload(LeaveType::Rejoin));
    h.advance(Duration::from_secs(600));
    assert_eq!(h.ctx.state, CommissioningState::Left);
    assert_eq!(h.platform.commissioning_starts().len(), before);

    h.press(ButtonId(0));
    h.release(ButtonId(0));
    assert_eq!(h.platform.commissioning_starts().len(), before + 1);
    assert_eq!(h.ctx.state, CommissioningState::SteeringInProgress);

    h.signal(SignalTag::Steering, Status::OK, &[]);
    assert_eq!(h.ctx.state, CommissioningState::Joined);
}

#[test]
fn retry_button_during_steering_is_ignored() {
    let mut h = joiner();
    h.boot();
    h.press(ButtonId(0));
    assert_eq!(h.platform.commissioning_starts().len(), 1);
}

// ---------------------------------------------------------------------------
// Sleepy devices
// ---------------------------------------------------------------------------

#[test]
fn sleepy_button_held_at_boot() {
    let mut h = Harness::new(NodeSettings {
        role: NodeRole::EndDevice,
        controller: false,
        ..NodeSettings::default()
    });
    h.platform.press_button(ButtonId(2));
    h.boot();
    assert_eq!(h.platform.rx_on_when_idle(), Some(false));

    h.signal(SignalTag::CanSleep, Status::OK, &250u32.to_le_bytes());
    assert_eq!(h.platform.sleep_count(), 1);
}

// ---------------------------------------------------------------------------
// Retry liveness
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn n_failures_make_n_plus_one_attempts(failures in 0usize..8) {
        let mut h = joiner();
        h.boot();
        for _ in 0..failures {
            h.signal(SignalTag::Steering, FAIL, &[]);
            h.advance(RETRY_DELAY);
        }
        h.signal(SignalTag::Steering, Status::OK, &[]);

        let times = h.platform.commissioning_start_times();
        prop_assert_eq!(times.len(), failures + 1);
        for pair in times.windows(2) {
            prop_assert_eq!(pair[1] - pair[0], RETRY_DELAY);
        }
        prop_assert_eq!(h.ctx.state, CommissioningState::Joined);
    }
}

//! Simulated network stack.
//!
//! Stands in for the radio stack on a host without hardware. Commissioning
//! requests complete after a configurable latency, fail according to the
//! `[simulation]` section, and a configured light answers discovery
//! queries. Everything the stack reports comes back to the node as
//! [`WorkItem::StackSignal`]s, exactly like signals from a real stack.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use meshcomm_commissioning::{CommissioningMode, NodeRole, StackError, ZclTarget};
use meshcomm_core::constants::{RET_ERROR, ZDP_STATUS_SUCCESS};
use meshcomm_core::signal::{
    DeviceAnnounce, LeaveParams, LeaveType, encode_device_announce, encode_leave,
};
use meshcomm_core::zcl::ZclCommand;
use meshcomm_core::{
    Endpoint, IeeeAddr, MatchDescRequest, MatchDescResponse, ShortAddr, SignalTag, Status,
};

use crate::config::{PeerSection, SimulationSection};
use crate::node::WorkItem;

/// Gap between sleep offers while the node is sleepy.
const SLEEP_OFFER_INTERVAL: Duration = Duration::from_secs(1);

/// Capability bits a mains-powered router announces with.
const ROUTER_CAPABILITIES: u8 = 0x8e;

#[derive(Debug)]
pub struct SimulatedStack {
    tx: mpsc::Sender<WorkItem>,
    rng: StdRng,
    role: NodeRole,
    ieee_addr: IeeeAddr,
    latency: Duration,
    factory_new: bool,
    failures_left: u32,
    failure_probability: f64,
    /// The signal that completes the running procedure.
    completion: Option<SignalTag>,
    rx_on_when_idle: bool,
    peer: Option<PeerSection>,
    queries_seen: u32,
}

impl SimulatedStack {
    pub fn new(config: &SimulationSection, role: NodeRole, tx: mpsc::Sender<WorkItem>) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let ieee_addr = IeeeAddr::new(rng.r#gen());
        Self {
            tx,
            rng,
            role,
            ieee_addr,
            latency: Duration::from_millis(config.latency_ms),
            factory_new: config.factory_new,
            failures_left: config.steering_failures,
            failure_probability: config.failure_probability,
            completion: None,
            rx_on_when_idle: true,
            peer: config.peer.clone(),
            queries_seen: 0,
        }
    }

    pub fn ieee_addr(&self) -> IeeeAddr {
        self.ieee_addr
    }

    /// Bring the stack up; it reports skip-startup once ready.
    pub fn boot(&mut self) {
        tracing::debug!(ieee_addr = %self.ieee_addr, "simulated stack booting");
        self.emit(self.latency, SignalTag::SkipStartup, Status::OK, Vec::new());
    }

    /// The node picked up a signal; a procedure completes when its final
    /// signal is delivered.
    pub fn signal_delivered(&mut self, tag: u16) {
        if self.completion.map(SignalTag::to_u16) == Some(tag) {
            self.completion = None;
        }
    }

    pub fn is_factory_new(&self) -> bool {
        self.factory_new
    }

    pub fn start_commissioning(&mut self, mode: CommissioningMode) -> bool {
        if let Some(running) = self.completion {
            tracing::debug!(?mode, ?running, "simulated stack busy");
            return false;
        }

        match mode {
            CommissioningMode::Initialization => {
                let tag = if self.factory_new {
                    SignalTag::DeviceFirstStart
                } else {
                    SignalTag::DeviceReboot
                };
                let status = self.attempt();
                self.complete_with(self.latency, tag, status);
            }
            CommissioningMode::SteeringAndFormation => {
                let formed = self.attempt();
                if formed.is_ok() {
                    // the node asks for steering itself once it sees first start
                    self.emit(self.latency, SignalTag::Formation, Status::OK, Vec::new());
                    self.factory_new = false;
                    self.complete_with(self.latency * 2, SignalTag::DeviceFirstStart, Status::OK);
                } else {
                    self.complete_with(self.latency, SignalTag::Formation, formed);
                }
            }
            CommissioningMode::NetworkSteering => {
                let status = self.attempt();
                if status.is_ok() {
                    self.factory_new = false;
                }
                self.complete_with(self.latency, SignalTag::Steering, status);
            }
        }
        tracing::debug!(?mode, "simulated commissioning started");
        true
    }

    pub fn set_rx_on_when_idle(&mut self, rx_on: bool) {
        self.rx_on_when_idle = rx_on;
        tracing::debug!(rx_on, "simulated radio receiver mode");
    }

    pub fn sleep_now(&mut self) {
        tracing::debug!("simulated radio asleep");
        self.offer_sleep(SLEEP_OFFER_INTERVAL);
    }

    /// The request in `frame` was broadcast; a configured peer may answer.
    pub fn send_match_desc(&mut self, frame: &[u8]) -> Result<(), StackError> {
        if self.factory_new {
            return Err(StackError::NotJoined);
        }
        let request = match MatchDescRequest::decode(frame) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(%err, "simulated stack dropped malformed query");
                return Err(StackError::Rejected(RET_ERROR));
            }
        };

        self.queries_seen += 1;
        let Some(peer) = &self.peer else {
            tracing::debug!(target_addr = %request.nwk_addr, "query broadcast, no light present");
            return Ok(());
        };
        if self.queries_seen < peer.respond_after_queries {
            tracing::debug!(query = self.queries_seen, "simulated light missed the query");
            return Ok(());
        }

        let addr = ShortAddr::new(peer.short_addr);
        let response = MatchDescResponse {
            src_addr: addr,
            status: ZDP_STATUS_SUCCESS,
            addr_of_interest: addr,
            endpoints: vec![Endpoint::new(peer.endpoint)],
        };
        self.emit(
            self.latency,
            SignalTag::MatchDescResponse,
            Status::OK,
            response.encode(),
        );
        Ok(())
    }

    pub fn send_zcl(&mut self, frame: &[u8], target: ZclTarget) -> Result<(), StackError> {
        if self.factory_new {
            return Err(StackError::NotJoined);
        }
        match ZclCommand::decode(target.cluster, frame) {
            Ok((seq, command)) => tracing::info!(
                dst_addr = %target.dst_addr,
                dst_endpoint = %target.dst_endpoint,
                seq,
                ?command,
                "light command sent"
            ),
            Err(err) => tracing::warn!(cluster = %target.cluster, %err, "malformed cluster frame"),
        }
        Ok(())
    }

    /// Leave the network, as if asked to by the network manager.
    pub fn request_leave(&mut self, rejoin: bool) {
        let leave_type = if rejoin {
            LeaveType::Rejoin
        } else {
            LeaveType::Reset
        };
        if leave_type == LeaveType::Reset {
            self.factory_new = true;
        }
        let params = LeaveParams {
            device: self.ieee_addr,
            leave_type,
        };
        self.emit(
            self.latency,
            SignalTag::Leave,
            Status::OK,
            encode_leave(&params).to_vec(),
        );
    }

    fn attempt(&mut self) -> Status {
        let fail = if self.failures_left > 0 {
            self.failures_left -= 1;
            true
        } else {
            self.rng.gen_bool(self.failure_probability)
        };
        if fail { Status(RET_ERROR) } else { Status::OK }
    }

    fn complete_with(&mut self, delay: Duration, tag: SignalTag, status: Status) {
        self.completion = Some(tag);
        self.emit(delay, tag, status, Vec::new());

        if !status.is_ok() || !matches!(tag, SignalTag::Steering | SignalTag::DeviceReboot) {
            return;
        }
        if self.role.forms_network()
            && let Some(peer) = &self.peer
        {
            let announce = DeviceAnnounce {
                short_addr: ShortAddr::new(peer.short_addr),
                ieee_addr: IeeeAddr::new(u64::from(peer.short_addr).to_be_bytes()),
                capabilities: ROUTER_CAPABILITIES,
            };
            self.emit(
                delay + self.latency,
                SignalTag::DeviceAnnounce,
                Status::OK,
                encode_device_announce(&announce).to_vec(),
            );
        }
        if !self.rx_on_when_idle {
            self.offer_sleep(delay + SLEEP_OFFER_INTERVAL);
        }
    }

    fn offer_sleep(&mut self, after: Duration) {
        let sleep_ms = u32::try_from(SLEEP_OFFER_INTERVAL.as_millis()).unwrap_or(u32::MAX);
        self.emit(
            after,
            SignalTag::CanSleep,
            Status::OK,
            sleep_ms.to_le_bytes().to_vec(),
        );
    }

    fn emit(&self, after: Duration, tag: SignalTag, status: Status, payload: Vec<u8>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let item = WorkItem::StackSignal {
                tag: tag.to_u16(),
                status,
                payload,
            };
            if tx.send(item).await.is_err() {
                tracing::trace!(?tag, "node gone, signal dropped");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(config: SimulationSection) -> (SimulatedStack, mpsc::Receiver<WorkItem>) {
        let (tx, rx) = mpsc::channel(64);
        (SimulatedStack::new(&config, NodeRole::Router, tx), rx)
    }

    async fn next_signal(rx: &mut mpsc::Receiver<WorkItem>) -> (u16, Status, Vec<u8>) {
        match rx.recv().await {
            Some(WorkItem::StackSignal {
                tag,
                status,
                payload,
            }) => (tag, status, payload),
            other => panic!("expected a stack signal, got {other:?}"),
        }
    }

    fn seeded() -> SimulationSection {
        SimulationSection {
            seed: Some(1),
            latency_ms: 10,
            ..SimulationSection::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn boot_reports_skip_startup() {
        let (mut stack, mut rx) = stack(seeded());
        stack.boot();
        let (tag, status, _) = next_signal(&mut rx).await;
        assert_eq!(tag, SignalTag::SkipStartup.to_u16());
        assert!(status.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_failures_come_first() {
        let (mut stack, mut rx) = stack(SimulationSection {
            steering_failures: 2,
            ..seeded()
        });

        for expect_ok in [false, false, true] {
            assert!(stack.start_commissioning(CommissioningMode::NetworkSteering));
            let (tag, status, _) = next_signal(&mut rx).await;
            assert_eq!(tag, SignalTag::Steering.to_u16());
            assert_eq!(status.is_ok(), expect_ok);
            stack.signal_delivered(tag);
        }
        assert!(!stack.is_factory_new());
    }

    #[tokio::test(start_paused = true)]
    async fn busy_until_completion_delivered() {
        let (mut stack, mut rx) = stack(seeded());
        assert!(stack.start_commissioning(CommissioningMode::NetworkSteering));
        assert!(!stack.start_commissioning(CommissioningMode::NetworkSteering));

        let (tag, _, _) = next_signal(&mut rx).await;
        stack.signal_delivered(SignalTag::SkipStartup.to_u16());
        assert!(!stack.start_commissioning(CommissioningMode::NetworkSteering));
        stack.signal_delivered(tag);
        assert!(stack.start_commissioning(CommissioningMode::NetworkSteering));
    }

    #[tokio::test(start_paused = true)]
    async fn formation_reports_first_start() {
        let (mut stack, mut rx) = stack(seeded());
        assert!(stack.start_commissioning(CommissioningMode::SteeringAndFormation));
        let (first, _, _) = next_signal(&mut rx).await;
        let (second, status, _) = next_signal(&mut rx).await;
        assert_eq!(first, SignalTag::Formation.to_u16());
        assert_eq!(second, SignalTag::DeviceFirstStart.to_u16());
        assert!(status.is_ok());
        assert!(!stack.is_factory_new());

        // steering is a separate request once first start is delivered
        assert!(!stack.start_commissioning(CommissioningMode::NetworkSteering));
        stack.signal_delivered(second);
        assert!(stack.start_commissioning(CommissioningMode::NetworkSteering));
        let (third, _, _) = next_signal(&mut rx).await;
        assert_eq!(third, SignalTag::Steering.to_u16());
    }

    #[tokio::test(start_paused = true)]
    async fn initialization_depends_on_credentials() {
        let (mut stack, mut rx) = stack(SimulationSection {
            factory_new: false,
            ..seeded()
        });
        assert!(stack.start_commissioning(CommissioningMode::Initialization));
        let (tag, status, _) = next_signal(&mut rx).await;
        assert_eq!(tag, SignalTag::DeviceReboot.to_u16());
        assert!(status.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn peer_answers_after_configured_queries() {
        let mut config = seeded();
        config.factory_new = false;
        config.peer = Some(PeerSection {
            short_addr: 0x4242,
            endpoint: 7,
            respond_after_queries: 2,
        });
        let (mut stack, mut rx) = stack(config);
        let frame = meshcomm_commissioning::NodeSettings::default()
            .discovery
            .request()
            .encode()
            .unwrap();

        stack.send_match_desc(&frame).unwrap();
        let silent = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(silent.is_err());

        stack.send_match_desc(&frame).unwrap();
        let (tag, _, payload) = next_signal(&mut rx).await;
        assert_eq!(tag, SignalTag::MatchDescResponse.to_u16());
        let response = MatchDescResponse::decode(&payload).unwrap();
        assert_eq!(response.src_addr, ShortAddr::new(0x4242));
        assert_eq!(response.first_match(), Some(Endpoint::new(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn sends_need_a_network() {
        let (mut stack, _rx) = stack(seeded());
        assert!(matches!(stack.send_match_desc(&[]), Err(StackError::NotJoined)));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_leave_forgets_credentials() {
        let (mut stack, mut rx) = stack(SimulationSection {
            factory_new: false,
            ..seeded()
        });
        stack.request_leave(false);
        let (tag, status, payload) = next_signal(&mut rx).await;
        assert_eq!(tag, SignalTag::Leave.to_u16());
        assert!(status.is_ok());
        assert_eq!(payload.last(), Some(&(LeaveType::Reset as u8)));
        assert!(stack.is_factory_new());
    }
}

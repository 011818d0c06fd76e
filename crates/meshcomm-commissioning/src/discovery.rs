//! Peer discovery for controller nodes.
//!
//! A round broadcasts a match-descriptor query for the configured capability
//! set and waits for the first successful answer. Two timers drive it:
//!
//! - [`TimerPurpose::DiscoveryQuery`] holds the query buffer until the query
//!   is sent.
//! - [`TimerPurpose::DiscoveryTimeout`] fires when nobody answered in time
//!   and starts the next round.
//!
//! The loop never gives up. It goes quiet once a peer is recorded because
//! the timeout is cancelled and neither timer is armed again.

use meshcomm_core::{BufRef, MatchDescResponse};

use crate::context::NodeContext;
use crate::error::{BufferError, SendError};
use crate::platform::{Indicator, Platform, Scheduler};
use crate::timer::{self, TimerPurpose};

/// Whether a discovery round is in flight.
pub fn is_running<P: Scheduler>(p: &P) -> bool {
    p.is_pending(TimerPurpose::DiscoveryQuery) || p.is_pending(TimerPurpose::DiscoveryTimeout)
}

/// Start discovery, reusing `buf` for the first query when given.
pub fn start<P: Platform>(ctx: &mut NodeContext, p: &mut P, buf: Option<BufRef>) {
    tracing::info!("looking for a peer");
    ctx.peer.clear();
    match buf.or_else(|| p.alloc()) {
        Some(buf) => {
            timer::arm(
                p,
                TimerPurpose::DiscoveryQuery,
                ctx.settings.timing.discovery_start_delay,
                Some(buf),
            );
        }
        // the timeout requests a buffer when it fires
        None => tracing::warn!("no buffer for the first discovery query"),
    }
    timer::arm(
        p,
        TimerPurpose::DiscoveryTimeout,
        ctx.settings.timing.discovery_timeout,
        None,
    );
}

/// The query timer fired; broadcast the query in `buf`.
pub fn on_query_timer<P: Platform>(ctx: &mut NodeContext, p: &mut P, buf: Option<BufRef>) {
    let Some(buf) = buf else {
        tracing::debug!("discovery query fired without a buffer");
        return;
    };
    if ctx.peer.is_recorded() {
        tracing::debug!("peer already found, dropping queued query");
        p.release(buf);
        return;
    }
    send_query(ctx, p, buf);
}

/// Encode and broadcast the query, consuming `buf`.
///
/// The recorded peer is cleared right before sending so only responses to
/// this round can fill it.
pub fn send_query<P: Platform>(ctx: &mut NodeContext, p: &mut P, buf: BufRef) {
    let request = ctx.settings.discovery.request();
    let written = p
        .initial_alloc(&buf, request.encoded_len())
        .and_then(|out| request.encode_into(out).map_err(BufferError::from));
    if let Err(err) = written {
        tracing::warn!(%err, "unable to build match descriptor request");
        p.release(buf);
        return;
    }

    ctx.peer.clear();
    tracing::info!(
        profile = %request.profile.get(),
        clusters = request.in_clusters.len(),
        dst = %request.nwk_addr,
        "sending match descriptor request"
    );
    if let Err(SendError { buf, reason }) = p.send_match_desc(buf) {
        // the armed timeout retries
        tracing::warn!(%reason, "match descriptor request not sent");
        p.release(buf);
    }
}

/// Nobody answered in time; start the next round.
///
/// `buf` is `None` when the timeout was armed without one, in which case a
/// buffer is requested and the round continues once it arrives.
pub fn on_timeout<P: Platform>(ctx: &mut NodeContext, p: &mut P, buf: Option<BufRef>) {
    if ctx.peer.is_recorded() {
        tracing::debug!("peer already found, ignoring discovery timeout");
        if let Some(buf) = buf {
            p.release(buf);
        }
        return;
    }

    let Some(buf) = buf.or_else(|| p.alloc()) else {
        tracing::debug!("waiting for a buffer to retry discovery");
        if let Err(err) = p.alloc_delayed(TimerPurpose::DiscoveryTimeout) {
            tracing::error!(%err, "unable to request a discovery buffer");
        }
        return;
    };

    tracing::info!("no peer answered, retrying discovery");
    timer::arm(
        p,
        TimerPurpose::DiscoveryQuery,
        ctx.settings.timing.discovery_start_delay,
        Some(buf),
    );
    timer::arm(
        p,
        TimerPurpose::DiscoveryTimeout,
        ctx.settings.timing.discovery_timeout,
        None,
    );
}

/// A match-descriptor response arrived. The caller keeps the signal buffer.
///
/// Returns whether the response recorded the peer.
pub fn on_response<P: Platform>(
    ctx: &mut NodeContext,
    p: &mut P,
    response: &MatchDescResponse,
) -> bool {
    if ctx.peer.is_recorded() {
        tracing::debug!(src = %response.src_addr, "peer already recorded, ignoring response");
        return false;
    }
    let Some(endpoint) = response.first_match() else {
        tracing::debug!(
            src = %response.src_addr,
            status = response.status,
            matches = response.endpoints.len(),
            "response without a match"
        );
        return false;
    };

    ctx.peer.record(response.src_addr, endpoint);
    tracing::info!(addr = %response.src_addr, endpoint = endpoint.get(), "found peer");
    timer::disarm(p, TimerPurpose::DiscoveryTimeout);
    timer::disarm(p, TimerPurpose::DiscoveryQuery);
    p.set_indicator(Indicator::PeerFound, true);
    true
}

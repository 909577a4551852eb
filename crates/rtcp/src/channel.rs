// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection protocol state.
//!
//! A [`Channel`] is one TCP connection plus the control-protocol state the
//! dispatcher and builder mutate: the connection status, the remote's
//! bound locator, and the logical-port negotiation lists.
//!
//! # State Machine
//!
//! ```text
//!   +--------------+      +------------+
//!   | Disconnected |<-----| Connecting |  (fresh TCP connection)
//!   +------+-------+      +-----+------+
//!          ^                    | send_connection_request
//!          |                    v
//!          |        +------------------------+
//!          +--------| WaitingForBindResponse |
//!          |        +------------+-----------+
//!          |                     | BIND_CONNECTION_RESPONSE
//!          |                     | (OK / EXISTING_CONNECTION,
//!          |                     |  matching transaction id)
//!          |                     v
//!          |              +-------------+
//!          +--------------| Established |
//!   transport disconnect  +-------------+
//!   / UNBIND / fatal bind
//! ```
//!
//! The acceptor side of a connection jumps straight from `Connecting` to
//! `Established` when a bind request is processed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::locator::Locator;
use crate::protocol::ResponseCode;
use crate::transaction::TransactionId;

// ============================================================================
// Channel status
// ============================================================================

/// Connection state machine states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelStatus {
    /// No session; also the terminal state after teardown.
    #[default]
    Disconnected,

    /// TCP connected, bind handshake not yet started.
    Connecting,

    /// Bind request sent, awaiting the peer's response.
    WaitingForBindResponse,

    /// Bind handshake complete; logical ports may be negotiated.
    Established,
}

impl ChannelStatus {
    pub fn is_established(&self) -> bool {
        matches!(self, ChannelStatus::Established)
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelStatus::Disconnected => "Disconnected",
            ChannelStatus::Connecting => "Connecting",
            ChannelStatus::WaitingForBindResponse => "WaitingForBindResponse",
            ChannelStatus::Established => "Established",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Logical port bookkeeping
// ============================================================================

/// Logical-port negotiation state, guarded by the channel's pending mutex.
#[derive(Debug, Default)]
pub(crate) struct LogicalPortState {
    /// Ports awaiting an open request/response cycle, in request order.
    pub pending_output: Vec<u16>,

    /// Ports the peer accepted.
    pub opened_output: Vec<u16>,

    /// Ports the peer rejected with `INVALID_PORT`.
    pub rejected: Vec<u16>,

    /// Open requests in flight: transaction id -> logical port.
    pub negotiating: HashMap<TransactionId, u16>,
}

// ============================================================================
// Channel
// ============================================================================

/// A TCP connection's control-protocol state.
///
/// Owned by the transport; the control core reads and mutates it through
/// shared references, so every field sits behind a lock or an atomic.
pub struct Channel {
    local_endpoint: SocketAddr,
    remote_endpoint: SocketAddr,

    status: Mutex<ChannelStatus>,

    /// The remote's bound locator as advertised in the bind
    /// request/response.
    locator: Mutex<Locator>,

    ports: Mutex<LogicalPortState>,

    waiting_for_keep_alive: AtomicBool,
}

impl Channel {
    /// Create a channel for a freshly connected TCP stream.
    pub fn new(local_endpoint: SocketAddr, remote_endpoint: SocketAddr) -> Self {
        Self {
            local_endpoint,
            remote_endpoint,
            status: Mutex::new(ChannelStatus::Connecting),
            locator: Mutex::new(Locator::from_socket_addr(remote_endpoint)),
            ports: Mutex::new(LogicalPortState::default()),
            waiting_for_keep_alive: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn local_endpoint(&self) -> SocketAddr {
        self.local_endpoint
    }

    pub fn remote_endpoint(&self) -> SocketAddr {
        self.remote_endpoint
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.lock()
    }

    pub fn is_established(&self) -> bool {
        self.status().is_established()
    }

    pub fn locator(&self) -> Locator {
        *self.locator.lock()
    }

    pub fn waiting_for_keep_alive(&self) -> bool {
        self.waiting_for_keep_alive.load(Ordering::Acquire)
    }

    pub fn set_waiting_for_keep_alive(&self, waiting: bool) {
        self.waiting_for_keep_alive.store(waiting, Ordering::Release);
    }

    pub fn pending_logical_ports(&self) -> Vec<u16> {
        self.ports.lock().pending_output.clone()
    }

    pub fn opened_logical_ports(&self) -> Vec<u16> {
        self.ports.lock().opened_output.clone()
    }

    pub fn rejected_logical_ports(&self) -> Vec<u16> {
        self.ports.lock().rejected.clone()
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    pub(crate) fn set_status(&self, status: ChannelStatus) {
        *self.status.lock() = status;
    }

    pub(crate) fn set_locator(&self, locator: Locator) {
        *self.locator.lock() = locator;
    }

    /// Transport-initiated teardown: any state collapses to
    /// `Disconnected`.
    pub fn mark_disconnected(&self) {
        self.set_status(ChannelStatus::Disconnected);
        self.set_waiting_for_keep_alive(false);
        self.ports.lock().negotiating.clear();
    }

    /// Accept or reject an inbound bind request.
    ///
    /// Records the remote locator and establishes the channel; a channel
    /// that is already established answers `EXISTING_CONNECTION` instead.
    pub fn process_bind_request(&self, remote_locator: Locator) -> ResponseCode {
        let mut status = self.status.lock();
        if *status == ChannelStatus::Established {
            return ResponseCode::ExistingConnection;
        }
        *status = ChannelStatus::Established;
        drop(status);

        self.set_locator(remote_locator);
        ResponseCode::Ok
    }

    // ========================================================================
    // Logical port negotiation
    // ========================================================================

    /// Lock the logical-port lists. Never hold this guard across a
    /// transport send.
    pub(crate) fn logical_ports(&self) -> MutexGuard<'_, LogicalPortState> {
        self.ports.lock()
    }

    /// Enqueue a logical port for opening once the channel is bound.
    pub fn add_logical_port(&self, port: u16) {
        let mut ports = self.ports.lock();
        if !ports.pending_output.contains(&port)
            && !ports.opened_output.contains(&port)
            && !ports.negotiating.values().any(|&p| p == port)
        {
            ports.pending_output.push(port);
        }
    }

    /// Record the in-flight open request for `port` under transaction
    /// `id`.
    pub(crate) fn register_open_negotiation(&self, id: TransactionId, port: u16) {
        self.ports.lock().negotiating.insert(id, port);
    }

    /// Settle an in-flight open request: the port moves from pending to
    /// opened or rejected.
    pub fn add_logical_port_response(&self, id: TransactionId, accepted: bool) {
        let mut ports = self.ports.lock();
        let Some(port) = ports.negotiating.remove(&id) else {
            log::warn!(
                "open-port response for unknown negotiation (transaction {})",
                id
            );
            return;
        };

        match ports.pending_output.iter().position(|&p| p == port) {
            Some(index) => {
                ports.pending_output.remove(index);
                if accepted {
                    log::debug!("logical port {} opened on {}", port, self.remote_endpoint);
                    ports.opened_output.push(port);
                } else {
                    log::debug!("logical port {} rejected by {}", port, self.remote_endpoint);
                    ports.rejected.push(port);
                }
            }
            None => {
                log::warn!("open-port response for port {} not pending", port);
            }
        }
    }

    /// Pick the next port to pursue from the peer's advertised list.
    pub fn process_check_logical_ports_response(
        &self,
        id: TransactionId,
        available_ports: &[u16],
    ) {
        match available_ports.first() {
            Some(&port) => self.set_logical_port_pending(port),
            None => log::debug!(
                "no available logical ports advertised (transaction {})",
                id
            ),
        }
    }

    /// Requeue a port for (re)opening, e.g. after the peer reported it
    /// closed.
    pub fn set_logical_port_pending(&self, port: u16) {
        let mut ports = self.ports.lock();
        if let Some(index) = ports.opened_output.iter().position(|&p| p == port) {
            ports.opened_output.remove(index);
            ports.pending_output.push(port);
        } else if !ports.pending_output.contains(&port) {
            ports.pending_output.push(port);
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ports = self.ports.lock();
        f.debug_struct("Channel")
            .field("local_endpoint", &self.local_endpoint)
            .field("remote_endpoint", &self.remote_endpoint)
            .field("status", &self.status())
            .field("pending_ports", &ports.pending_output)
            .field("opened_ports", &ports.opened_output)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn make_channel() -> Channel {
        Channel::new(
            "127.0.0.1:5100".parse().unwrap(),
            "127.0.0.1:45000".parse().unwrap(),
        )
    }

    #[test]
    fn test_new_channel_state() {
        let channel = make_channel();
        assert_eq!(channel.status(), ChannelStatus::Connecting);
        assert!(!channel.is_established());
        assert!(!channel.waiting_for_keep_alive());
        assert!(channel.pending_logical_ports().is_empty());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ChannelStatus::Disconnected.to_string(), "Disconnected");
        assert_eq!(
            ChannelStatus::WaitingForBindResponse.to_string(),
            "WaitingForBindResponse"
        );
        assert_eq!(ChannelStatus::Established.to_string(), "Established");
    }

    #[test]
    fn test_process_bind_request() {
        let channel = make_channel();
        let mut remote = Locator::tcp_v4(Ipv4Addr::new(10, 0, 0, 9), 45000);
        remote.set_logical_port(7400);

        assert_eq!(channel.process_bind_request(remote), ResponseCode::Ok);
        assert!(channel.is_established());
        assert_eq!(channel.locator(), remote);

        // A second bind on an established channel is refused.
        assert_eq!(
            channel.process_bind_request(remote),
            ResponseCode::ExistingConnection
        );
    }

    #[test]
    fn test_add_logical_port_dedup() {
        let channel = make_channel();
        channel.add_logical_port(7400);
        channel.add_logical_port(7400);
        channel.add_logical_port(7401);
        assert_eq!(channel.pending_logical_ports(), vec![7400, 7401]);
    }

    #[test]
    fn test_open_negotiation_accepted() {
        let channel = make_channel();
        channel.add_logical_port(7400);
        channel.register_open_negotiation(42, 7400);

        channel.add_logical_port_response(42, true);
        assert!(channel.pending_logical_ports().is_empty());
        assert_eq!(channel.opened_logical_ports(), vec![7400]);
        assert!(channel.rejected_logical_ports().is_empty());
    }

    #[test]
    fn test_open_negotiation_rejected() {
        let channel = make_channel();
        channel.add_logical_port(7400);
        channel.register_open_negotiation(43, 7400);

        channel.add_logical_port_response(43, false);
        assert!(channel.pending_logical_ports().is_empty());
        assert!(channel.opened_logical_ports().is_empty());
        assert_eq!(channel.rejected_logical_ports(), vec![7400]);
    }

    #[test]
    fn test_unknown_negotiation_ignored() {
        let channel = make_channel();
        channel.add_logical_port(7400);
        channel.add_logical_port_response(999, true);
        assert_eq!(channel.pending_logical_ports(), vec![7400]);
    }

    #[test]
    fn test_set_logical_port_pending_reopens() {
        let channel = make_channel();
        channel.add_logical_port(7400);
        channel.register_open_negotiation(1, 7400);
        channel.add_logical_port_response(1, true);
        assert_eq!(channel.opened_logical_ports(), vec![7400]);

        // Peer closed the port; it goes back to pending.
        channel.set_logical_port_pending(7400);
        assert!(channel.opened_logical_ports().is_empty());
        assert_eq!(channel.pending_logical_ports(), vec![7400]);

        // Requeueing an already-pending port is a no-op.
        channel.set_logical_port_pending(7400);
        assert_eq!(channel.pending_logical_ports(), vec![7400]);
    }

    #[test]
    fn test_check_response_pends_first_port() {
        let channel = make_channel();
        channel.process_check_logical_ports_response(5, &[7410, 7411]);
        assert_eq!(channel.pending_logical_ports(), vec![7410]);

        channel.process_check_logical_ports_response(6, &[]);
        assert_eq!(channel.pending_logical_ports(), vec![7410]);
    }

    #[test]
    fn test_mark_disconnected() {
        let channel = make_channel();
        channel.set_status(ChannelStatus::Established);
        channel.set_waiting_for_keep_alive(true);
        channel.register_open_negotiation(9, 7400);

        channel.mark_disconnected();
        assert_eq!(channel.status(), ChannelStatus::Disconnected);
        assert!(!channel.waiting_for_keep_alive());
        assert!(channel.logical_ports().negotiating.is_empty());
    }
}

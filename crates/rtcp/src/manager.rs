// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound control message assembly.
//!
//! [`RtcpMessageManager`] owns the transaction registry shared by all
//! channels of one transport and builds every outbound control frame:
//! headers are filled per message kind (flag bits, length arithmetic,
//! registry insertion for request kinds that expect a response), the CRC
//! is computed when enabled, and the finished frame is handed to the
//! borrowed [`Transport`].
//!
//! The inbound half of the manager lives in the dispatcher module.

use crate::channel::{Channel, ChannelStatus};
use crate::locator::{Locator, LocatorKind};
use crate::protocol::{
    compute_crc, put_u32, CheckLogicalPortsRequest, ConnectionRequest, ControlHeader,
    ControlKind, KeepAliveRequest, LogicalPortIsClosedRequest, OpenLogicalPortRequest,
    ProtocolVersion, ResponseCode, SerializedPayload, TcpHeader, DEFAULT_ENDIAN,
    ENVELOPE_OVERHEAD, RTCP_PROTOCOL_VERSION,
};
use crate::transaction::{TransactionId, TransactionRegistry};
use crate::transport::Transport;

/// Control-plane message manager for one TCP transport.
pub struct RtcpMessageManager {
    registry: TransactionRegistry,
}

impl RtcpMessageManager {
    pub fn new() -> Self {
        Self {
            registry: TransactionRegistry::new(),
        }
    }

    /// Whether a request with this transaction id is still awaiting its
    /// response.
    pub fn has_outstanding(&self, id: TransactionId) -> bool {
        self.registry.find(id)
    }

    pub(crate) fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    /// Whether the peer's announced protocol version is one this
    /// implementation accepts.
    pub fn is_compatible_protocol(&self, version: ProtocolVersion) -> bool {
        version == RTCP_PROTOCOL_VERSION
    }

    // ========================================================================
    // Frame assembly
    // ========================================================================

    /// Populate both headers for an outbound message.
    ///
    /// Sets the kind, length fields and flag bits, and registers the
    /// transaction id for request kinds that expect a response. The CRC is
    /// filled in by [`send_data`](Self::send_data) once the body bytes
    /// exist.
    fn fill_headers(
        &self,
        kind: u8,
        transaction_id: TransactionId,
        payload: Option<&SerializedPayload>,
        code: Option<ResponseCode>,
    ) -> (TcpHeader, ControlHeader) {
        let mut length = ControlHeader::SIZE;
        if code.is_some() {
            length += 4;
        }
        if let Some(payload) = payload {
            length += ENVELOPE_OVERHEAD + payload.len();
        }

        let requires_response =
            ControlKind::from_octet(kind).is_some_and(ControlKind::expects_response);
        if requires_response {
            self.registry.add(transaction_id);
        }

        let mut ctrl_header = ControlHeader {
            kind,
            flags: 0,
            length: length as u16,
            transaction_id,
        };
        ctrl_header.set_flags(DEFAULT_ENDIAN, payload.is_some(), requires_response);

        let tcp_header = TcpHeader {
            logical_port: 0, // control channel
            length: (TcpHeader::SIZE + length) as u32,
            crc: 0,
        };

        (tcp_header, ctrl_header)
    }

    /// Assemble and send one control message.
    ///
    /// Returns true iff the transport accepted at least one byte; a short
    /// send is logged but still counts as success.
    pub(crate) fn send_data(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        kind: u8,
        transaction_id: TransactionId,
        payload: Option<&SerializedPayload>,
        code: Option<ResponseCode>,
    ) -> bool {
        let (mut tcp_header, ctrl_header) =
            self.fill_headers(kind, transaction_id, payload, code);

        let mut body = Vec::with_capacity(ctrl_header.length as usize);
        ctrl_header.write(&mut body);
        if let Some(code) = code {
            put_u32(&mut body, code.wire_value(), DEFAULT_ENDIAN);
        }
        if let Some(payload) = payload {
            payload.write(&mut body, DEFAULT_ENDIAN);
        }

        if transport.configuration().calculate_crc {
            tcp_header.crc = compute_crc(&body);
        }

        let mut frame = Vec::with_capacity(TcpHeader::SIZE + body.len());
        tcp_header.write(&mut frame, DEFAULT_ENDIAN);
        frame.extend_from_slice(&body);

        let sent = transport.send(channel, &frame);
        if sent != frame.len() {
            log::warn!(
                "short send on {}: {} bytes of {}",
                channel.remote_endpoint(),
                sent,
                frame.len()
            );
        }
        sent > 0
    }

    // ========================================================================
    // Outbound requests
    // ========================================================================

    /// Start the bind handshake on a freshly connected channel.
    ///
    /// The announced locator is built from the channel's local endpoint;
    /// its physical port comes from the first configured listening port,
    /// falling back to the process id truncated to 16 bits when none is
    /// configured.
    pub fn send_connection_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
    ) -> TransactionId {
        let config = transport.configuration();
        let mut locator = Locator::from_socket_addr(channel.local_endpoint());
        match config.listening_ports.first() {
            Some(&port) => locator.set_physical_port(port),
            None => locator.set_physical_port(std::process::id() as u16),
        }
        if locator.kind() == LocatorKind::TcpV4 {
            locator.set_wan_address(config.wan_addr);
        }

        let request = ConnectionRequest {
            protocol_version: RTCP_PROTOCOL_VERSION,
            transport_locator: locator,
        };
        let payload = request.serialize(DEFAULT_ENDIAN);

        log::trace!(
            "send [BIND_CONNECTION_REQUEST] physical port {}",
            locator.physical_port()
        );
        let id = self.registry.next();
        self.send_data(
            transport,
            channel,
            ControlKind::BindConnectionRequest.octet(),
            id,
            Some(&payload),
            None,
        );
        channel.set_status(ChannelStatus::WaitingForBindResponse);
        id
    }

    /// Ask the peer to open a logical port.
    pub fn send_open_logical_port_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        port: u16,
    ) -> TransactionId {
        let request = OpenLogicalPortRequest { logical_port: port };
        let payload = request.serialize(DEFAULT_ENDIAN);

        log::trace!("send [OPEN_LOGICAL_PORT_REQUEST] logical port {}", port);
        let id = self.registry.next();
        // Correlate before the bytes leave, so the response cannot race
        // the bookkeeping.
        channel.register_open_negotiation(id, port);
        self.send_data(
            transport,
            channel,
            ControlKind::OpenLogicalPortRequest.octet(),
            id,
            Some(&payload),
            None,
        );
        id
    }

    /// Probe a range of logical ports on the peer.
    pub fn send_check_logical_ports_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        ports: Vec<u16>,
    ) -> TransactionId {
        let request = CheckLogicalPortsRequest {
            logical_ports_range: ports,
        };
        let payload = request.serialize(DEFAULT_ENDIAN);

        log::trace!("send [CHECK_LOGICAL_PORT_REQUEST]");
        let id = self.registry.next();
        self.send_data(
            transport,
            channel,
            ControlKind::CheckLogicalPortRequest.octet(),
            id,
            Some(&payload),
            None,
        );
        id
    }

    /// Probe session liveliness; the channel waits for the response.
    pub fn send_keep_alive_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
    ) -> TransactionId {
        let request = KeepAliveRequest {
            locator: channel.locator(),
        };
        let payload = request.serialize(DEFAULT_ENDIAN);

        log::trace!("send [KEEP_ALIVE_REQUEST]");
        channel.set_waiting_for_keep_alive(true);
        let id = self.registry.next();
        self.send_data(
            transport,
            channel,
            ControlKind::KeepAliveRequest.octet(),
            id,
            Some(&payload),
            None,
        );
        id
    }

    /// Tell the peer a logical port of ours is gone. No response is
    /// expected.
    pub fn send_logical_port_is_closed_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        port: u16,
    ) -> TransactionId {
        let request = LogicalPortIsClosedRequest { logical_port: port };
        let payload = request.serialize(DEFAULT_ENDIAN);

        log::trace!("send [LOGICAL_PORT_IS_CLOSED_REQUEST] logical port {}", port);
        let id = self.registry.next();
        self.send_data(
            transport,
            channel,
            ControlKind::LogicalPortIsClosedRequest.octet(),
            id,
            Some(&payload),
            None,
        );
        id
    }

    /// End the session. No payload, no response.
    pub fn send_unbind_connection_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
    ) -> TransactionId {
        log::trace!("send [UNBIND_CONNECTION_REQUEST]");
        let id = self.registry.next();
        self.send_data(
            transport,
            channel,
            ControlKind::UnbindConnectionRequest.octet(),
            id,
            None,
            None,
        );
        id
    }
}

impl Default for RtcpMessageManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

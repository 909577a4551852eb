// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound control message dispatch.
//!
//! [`RtcpMessageManager::process_rtcp_message`] runs on the transport's
//! receive thread for a channel: it parses the control header, validates
//! the declared length against what actually arrived, decodes the payload
//! for the message kind and runs the per-kind handler. Handlers mutate
//! channel state and answer through the borrowed transport.
//!
//! Failure semantics: structural problems (length mismatch, unknown kind,
//! undecodable payload) are echoed back as `BAD_REQUEST` on the same
//! channel and never tear it down; a protocol-version mismatch is
//! surfaced as `INCOMPATIBLE_VERSION` so the caller can close the channel.

use crate::channel::{Channel, ChannelStatus};
use crate::locator::{Locator, LocatorKind};
use crate::manager::RtcpMessageManager;
use crate::protocol::{
    BindConnectionResponse, CheckLogicalPortsRequest, CheckLogicalPortsResponse,
    ConnectionRequest, ControlHeader, ControlKind, Cursor, KeepAliveRequest,
    LogicalPortIsClosedRequest, OpenLogicalPortRequest, ResponseCode, SerializedPayload,
    CodecResult, DEFAULT_ENDIAN, RTCP_PROTOCOL_VERSION,
};
use crate::transaction::TransactionId;
use crate::transport::Transport;

/// Printable name for a raw kind octet.
fn kind_name(kind: u8) -> String {
    match ControlKind::from_octet(kind) {
        Some(kind) => kind.to_string(),
        None => format!("0x{:02X}", kind),
    }
}

fn read_payload(data: &[u8], header: &ControlHeader) -> CodecResult<SerializedPayload> {
    let mut cursor = Cursor::new(data, header.endianness());
    SerializedPayload::read(&mut cursor)
}

fn read_code(data: &[u8], header: &ControlHeader) -> CodecResult<ResponseCode> {
    let mut cursor = Cursor::new(data, header.endianness());
    ResponseCode::from_wire(cursor.read_u32()?)
}

fn read_code_and_payload(
    data: &[u8],
    header: &ControlHeader,
) -> CodecResult<(ResponseCode, SerializedPayload)> {
    let mut cursor = Cursor::new(data, header.endianness());
    let code = ResponseCode::from_wire(cursor.read_u32()?)?;
    let payload = SerializedPayload::read(&mut cursor)?;
    Ok((code, payload))
}

impl RtcpMessageManager {
    /// Process one inbound control frame (the bytes after the TCP
    /// header).
    ///
    /// Returns the code the transport should act on: `OK` for anything
    /// handled locally, `INCOMPATIBLE_VERSION` or `UNKNOWN_LOCATOR` when
    /// the caller must tear the channel down.
    pub fn process_rtcp_message(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        buffer: &[u8],
    ) -> ResponseCode {
        let received = buffer.len();
        let header = match ControlHeader::read(buffer) {
            Ok(header) => header,
            Err(_) => {
                log::warn!("control frame of {} bytes has no complete header, dropped", received);
                return ResponseCode::Ok;
            }
        };

        // Declared-vs-received length validation.
        let declared_ok = (header.length as usize)
            .checked_sub(ControlHeader::SIZE)
            .is_some_and(|data_size| data_size + ControlHeader::SIZE == received);
        if !declared_ok {
            log::warn!(
                "length mismatch on [{}]: declared {} bytes, received {}",
                kind_name(header.kind),
                header.length,
                received
            );
            self.send_data(
                transport,
                channel,
                header.kind,
                header.transaction_id,
                None,
                Some(ResponseCode::BadRequest),
            );
            return ResponseCode::Ok;
        }

        let data = &buffer[ControlHeader::SIZE..];
        let id = header.transaction_id;

        match ControlKind::from_octet(header.kind) {
            Some(ControlKind::BindConnectionRequest) => {
                let request = match read_payload(data, &header)
                    .and_then(|p| ConnectionRequest::deserialize(&p))
                {
                    Ok(request) => request,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!(
                    "recv [BIND_CONNECTION_REQUEST] logical {} physical {}",
                    request.transport_locator.logical_port(),
                    request.transport_locator.physical_port()
                );
                self.process_bind_connection_request(transport, channel, &request, id)
            }

            Some(ControlKind::BindConnectionResponse) => {
                let (code, payload) = match read_code_and_payload(data, &header) {
                    Ok(pair) => pair,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                let response = match BindConnectionResponse::deserialize(&payload) {
                    Ok(response) => response,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!(
                    "recv [BIND_CONNECTION_RESPONSE] {} logical {}",
                    code,
                    response.locator.logical_port()
                );
                self.process_bind_connection_response(channel, &response, code, id)
            }

            Some(ControlKind::OpenLogicalPortRequest) => {
                let request = match read_payload(data, &header)
                    .and_then(|p| OpenLogicalPortRequest::deserialize(&p))
                {
                    Ok(request) => request,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!(
                    "recv [OPEN_LOGICAL_PORT_REQUEST] logical port {}",
                    request.logical_port
                );
                self.process_open_logical_port_request(transport, channel, &request, id)
            }

            Some(ControlKind::OpenLogicalPortResponse) => {
                // This kind never carries a payload envelope, only the code.
                let code = match read_code(data, &header) {
                    Ok(code) => code,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!("recv [OPEN_LOGICAL_PORT_RESPONSE] {}", code);
                self.process_open_logical_port_response(channel, code, id)
            }

            Some(ControlKind::CheckLogicalPortRequest) => {
                let request = match read_payload(data, &header)
                    .and_then(|p| CheckLogicalPortsRequest::deserialize(&p))
                {
                    Ok(request) => request,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!("recv [CHECK_LOGICAL_PORT_REQUEST]");
                self.process_check_logical_ports_request(transport, channel, &request, id);
                ResponseCode::Ok
            }

            Some(ControlKind::CheckLogicalPortResponse) => {
                let (code, payload) = match read_code_and_payload(data, &header) {
                    Ok(pair) => pair,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                let response = match CheckLogicalPortsResponse::deserialize(&payload) {
                    Ok(response) => response,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!("recv [CHECK_LOGICAL_PORT_RESPONSE] {}", code);
                self.process_check_logical_ports_response(channel, &response, id);
                ResponseCode::Ok
            }

            Some(ControlKind::KeepAliveRequest) => {
                let request = match read_payload(data, &header)
                    .and_then(|p| KeepAliveRequest::deserialize(&p))
                {
                    Ok(request) => request,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!("recv [KEEP_ALIVE_REQUEST]");
                self.process_keep_alive_request(transport, channel, &request, id)
            }

            Some(ControlKind::KeepAliveResponse) => {
                // Code only, no payload envelope.
                let code = match read_code(data, &header) {
                    Ok(code) => code,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!("recv [KEEP_ALIVE_RESPONSE] {}", code);
                self.process_keep_alive_response(channel, code, id)
            }

            Some(ControlKind::LogicalPortIsClosedRequest) => {
                let request = match read_payload(data, &header)
                    .and_then(|p| LogicalPortIsClosedRequest::deserialize(&p))
                {
                    Ok(request) => request,
                    Err(e) => return self.reply_bad_request(transport, channel, &header, e),
                };
                log::trace!(
                    "recv [LOGICAL_PORT_IS_CLOSED_REQUEST] logical port {}",
                    request.logical_port
                );
                self.process_logical_port_is_closed_request(transport, channel, &request, id);
                ResponseCode::Ok
            }

            Some(ControlKind::UnbindConnectionRequest) => {
                log::trace!("recv [UNBIND_CONNECTION_REQUEST]");
                transport.close(channel);
                ResponseCode::Ok
            }

            None => {
                log::warn!("unknown control message kind {}", kind_name(header.kind));
                self.send_data(
                    transport,
                    channel,
                    header.kind,
                    id,
                    None,
                    Some(ResponseCode::BadRequest),
                );
                ResponseCode::Ok
            }
        }
    }

    /// Echo a structural framing error back to the sender. The channel
    /// stays open.
    fn reply_bad_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        header: &ControlHeader,
        error: crate::protocol::CodecError,
    ) -> ResponseCode {
        log::warn!("malformed [{}]: {}", kind_name(header.kind), error);
        self.send_data(
            transport,
            channel,
            header.kind,
            header.transaction_id,
            None,
            Some(ResponseCode::BadRequest),
        );
        ResponseCode::Ok
    }

    // ========================================================================
    // Request handlers
    // ========================================================================

    fn process_bind_connection_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        request: &ConnectionRequest,
        id: TransactionId,
    ) -> ResponseCode {
        let mut local_locator = Locator::from_socket_addr(channel.local_endpoint());
        if local_locator.kind() == LocatorKind::TcpV4 {
            local_locator.set_wan_address(transport.configuration().wan_addr);
        }
        let response = BindConnectionResponse {
            locator: local_locator,
        };
        let payload = response.serialize(DEFAULT_ENDIAN);

        if !self.is_compatible_protocol(request.protocol_version) {
            self.send_data(
                transport,
                channel,
                ControlKind::BindConnectionResponse.octet(),
                id,
                Some(&payload),
                Some(ResponseCode::IncompatibleVersion),
            );
            log::warn!(
                "rejected client: expected protocol {} but received {}",
                RTCP_PROTOCOL_VERSION,
                request.protocol_version
            );
            return ResponseCode::IncompatibleVersion;
        }

        let code = channel.process_bind_request(request.transport_locator);
        self.send_data(
            transport,
            channel,
            ControlKind::BindConnectionResponse.octet(),
            id,
            Some(&payload),
            Some(code),
        );
        ResponseCode::Ok
    }

    fn process_open_logical_port_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        request: &OpenLogicalPortRequest,
        id: TransactionId,
    ) -> ResponseCode {
        if !channel.is_established() {
            self.send_data(
                transport,
                channel,
                ControlKind::CheckLogicalPortResponse.octet(),
                id,
                None,
                Some(ResponseCode::ServerError),
            );
        } else if request.logical_port == 0 || !transport.is_input_port_open(request.logical_port)
        {
            log::debug!(
                "send [OPEN_LOGICAL_PORT_RESPONSE] not found: {}",
                request.logical_port
            );
            self.send_data(
                transport,
                channel,
                ControlKind::OpenLogicalPortResponse.octet(),
                id,
                None,
                Some(ResponseCode::InvalidPort),
            );
        } else {
            log::debug!(
                "send [OPEN_LOGICAL_PORT_RESPONSE] found: {}",
                request.logical_port
            );
            self.send_data(
                transport,
                channel,
                ControlKind::OpenLogicalPortResponse.octet(),
                id,
                None,
                Some(ResponseCode::Ok),
            );
        }
        ResponseCode::Ok
    }

    fn process_check_logical_ports_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        request: &CheckLogicalPortsRequest,
        id: TransactionId,
    ) {
        if !channel.is_established() {
            self.send_data(
                transport,
                channel,
                ControlKind::CheckLogicalPortResponse.octet(),
                id,
                None,
                Some(ResponseCode::ServerError),
            );
            return;
        }

        let mut response = CheckLogicalPortsResponse::default();
        if request.logical_ports_range.is_empty() {
            log::warn!("no logical ports to check");
        } else {
            for &port in &request.logical_ports_range {
                if transport.is_input_port_open(port) {
                    if port == 0 {
                        log::debug!("logical port 0 is open but will not be considered");
                        continue;
                    }
                    log::debug!("found open logical port {}", port);
                    response.available_logical_ports.push(port);
                }
            }
        }

        let payload = response.serialize(DEFAULT_ENDIAN);
        self.send_data(
            transport,
            channel,
            ControlKind::CheckLogicalPortResponse.octet(),
            id,
            Some(&payload),
            Some(ResponseCode::Ok),
        );
    }

    fn process_keep_alive_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        request: &KeepAliveRequest,
        id: TransactionId,
    ) -> ResponseCode {
        if !channel.is_established() {
            self.send_data(
                transport,
                channel,
                ControlKind::KeepAliveResponse.octet(),
                id,
                None,
                Some(ResponseCode::ServerError),
            );
        } else if channel.locator().logical_port() == request.locator.logical_port() {
            self.send_data(
                transport,
                channel,
                ControlKind::KeepAliveResponse.octet(),
                id,
                None,
                Some(ResponseCode::Ok),
            );
        } else {
            self.send_data(
                transport,
                channel,
                ControlKind::KeepAliveResponse.octet(),
                id,
                None,
                Some(ResponseCode::UnknownLocator),
            );
            return ResponseCode::UnknownLocator;
        }
        ResponseCode::Ok
    }

    fn process_logical_port_is_closed_request(
        &self,
        transport: &dyn Transport,
        channel: &Channel,
        request: &LogicalPortIsClosedRequest,
        id: TransactionId,
    ) {
        if !channel.is_established() {
            self.send_data(
                transport,
                channel,
                ControlKind::CheckLogicalPortResponse.octet(),
                id,
                None,
                Some(ResponseCode::ServerError),
            );
        } else {
            channel.set_logical_port_pending(request.logical_port);
        }
    }

    // ========================================================================
    // Response handlers
    // ========================================================================

    fn process_bind_connection_response(
        &self,
        channel: &Channel,
        response: &BindConnectionResponse,
        code: ResponseCode,
        id: TransactionId,
    ) -> ResponseCode {
        if code == ResponseCode::Ok || code == ResponseCode::ExistingConnection {
            let mut result = ResponseCode::Ok;
            let ports = channel.logical_ports();
            if !ports.pending_output.is_empty() {
                if self.registry().find(id) {
                    log::debug!(
                        "connection established (physical {})",
                        response.locator.physical_port()
                    );
                    channel.set_locator(response.locator);
                    channel.set_status(ChannelStatus::Established);
                    self.registry().remove(id);
                } else {
                    log::warn!("bind response with an invalid transaction id {}", id);
                    result = ResponseCode::Void;
                }
            }
            result
        } else {
            // A failed bind closes the connection; the caller retries.
            if code == ResponseCode::IncompatibleVersion {
                log::error!("received INCOMPATIBLE_VERSION from server");
            }
            code
        }
    }

    fn process_open_logical_port_response(
        &self,
        channel: &Channel,
        code: ResponseCode,
        id: TransactionId,
    ) -> ResponseCode {
        if self.registry().find(id) {
            match code {
                ResponseCode::Ok => channel.add_logical_port_response(id, true),
                ResponseCode::InvalidPort => channel.add_logical_port_response(id, false),
                other => {
                    log::warn!("open logical port failed with code {}", other);
                }
            }
            self.registry().remove(id);
        } else {
            log::warn!("open-port response with an invalid transaction id {}", id);
        }
        ResponseCode::Ok
    }

    fn process_check_logical_ports_response(
        &self,
        channel: &Channel,
        response: &CheckLogicalPortsResponse,
        id: TransactionId,
    ) {
        if self.registry().find(id) {
            channel.process_check_logical_ports_response(id, &response.available_logical_ports);
            self.registry().remove(id);
        } else {
            log::warn!("check-ports response with an invalid transaction id {}", id);
        }
    }

    fn process_keep_alive_response(
        &self,
        channel: &Channel,
        code: ResponseCode,
        id: TransactionId,
    ) -> ResponseCode {
        if self.registry().find(id) {
            self.registry().remove(id);
            match code {
                ResponseCode::Ok => channel.set_waiting_for_keep_alive(false),
                ResponseCode::UnknownLocator => return ResponseCode::UnknownLocator,
                _ => {}
            }
        } else {
            log::warn!("keep-alive response with an unexpected transaction id {}", id);
        }
        ResponseCode::Ok
    }
}

// ============================================================================
// Tests
// ============================================================================

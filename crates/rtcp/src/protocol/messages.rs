// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control message payload structs and their CDR codec.
//!
//! Each struct serializes into a [`SerializedPayload`] whose encapsulation
//! identifier fixes the byte order, and deserializes from one honoring
//! whichever order the peer chose. Sequences of ports are a `u32` element
//! count followed by that many `u16` values; locators take the 24-byte
//! form described in [`crate::locator`].

use super::payload::SerializedPayload;
use super::{put_u16, put_u32, CodecResult, Cursor, Endianness, ProtocolVersion};
use crate::locator::Locator;

fn write_port_list(buf: &mut Vec<u8>, ports: &[u16], endianness: Endianness) {
    put_u32(buf, ports.len() as u32, endianness);
    for &port in ports {
        put_u16(buf, port, endianness);
    }
}

fn read_port_list(cursor: &mut Cursor<'_>) -> CodecResult<Vec<u16>> {
    let count = cursor.read_u32()? as usize;
    let mut ports = Vec::with_capacity(count.min(cursor.remaining() / 2));
    for _ in 0..count {
        ports.push(cursor.read_u16()?);
    }
    Ok(ports)
}

// ============================================================================
// ConnectionRequest
// ============================================================================

/// Payload of `BIND_CONNECTION_REQUEST`: the protocol version the sender
/// speaks and the locator it wants the peer to know it by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub protocol_version: ProtocolVersion,
    pub transport_locator: Locator,
}

impl ConnectionRequest {
    pub fn serialize(&self, endianness: Endianness) -> SerializedPayload {
        let mut data = Vec::with_capacity(28);
        data.push(self.protocol_version.major);
        data.push(self.protocol_version.minor);
        // CDR alignment: the locator's u32 kind starts on a 4-byte boundary.
        data.extend_from_slice(&[0u8; 2]);
        self.transport_locator.write(&mut data, endianness);
        SerializedPayload::new(endianness, data)
    }

    pub fn deserialize(payload: &SerializedPayload) -> CodecResult<Self> {
        let mut cursor = Cursor::new(&payload.data, payload.endianness()?);
        let major = cursor.read_u8()?;
        let minor = cursor.read_u8()?;
        cursor.skip(2)?;
        Ok(Self {
            protocol_version: ProtocolVersion::new(major, minor),
            transport_locator: Locator::read(&mut cursor)?,
        })
    }
}

// ============================================================================
// BindConnectionResponse
// ============================================================================

/// Payload of `BIND_CONNECTION_RESPONSE`: the responder's own locator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindConnectionResponse {
    pub locator: Locator,
}

impl BindConnectionResponse {
    pub fn serialize(&self, endianness: Endianness) -> SerializedPayload {
        let mut data = Vec::with_capacity(24);
        self.locator.write(&mut data, endianness);
        SerializedPayload::new(endianness, data)
    }

    pub fn deserialize(payload: &SerializedPayload) -> CodecResult<Self> {
        let mut cursor = Cursor::new(&payload.data, payload.endianness()?);
        Ok(Self {
            locator: Locator::read(&mut cursor)?,
        })
    }
}

// ============================================================================
// OpenLogicalPortRequest
// ============================================================================

/// Payload of `OPEN_LOGICAL_PORT_REQUEST`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenLogicalPortRequest {
    pub logical_port: u16,
}

impl OpenLogicalPortRequest {
    pub fn serialize(&self, endianness: Endianness) -> SerializedPayload {
        let mut data = Vec::with_capacity(2);
        put_u16(&mut data, self.logical_port, endianness);
        SerializedPayload::new(endianness, data)
    }

    pub fn deserialize(payload: &SerializedPayload) -> CodecResult<Self> {
        let mut cursor = Cursor::new(&payload.data, payload.endianness()?);
        Ok(Self {
            logical_port: cursor.read_u16()?,
        })
    }
}

// ============================================================================
// CheckLogicalPortsRequest
// ============================================================================

/// Payload of `CHECK_LOGICAL_PORT_REQUEST`: candidate ports to probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckLogicalPortsRequest {
    pub logical_ports_range: Vec<u16>,
}

impl CheckLogicalPortsRequest {
    pub fn serialize(&self, endianness: Endianness) -> SerializedPayload {
        let mut data = Vec::with_capacity(4 + 2 * self.logical_ports_range.len());
        write_port_list(&mut data, &self.logical_ports_range, endianness);
        SerializedPayload::new(endianness, data)
    }

    pub fn deserialize(payload: &SerializedPayload) -> CodecResult<Self> {
        let mut cursor = Cursor::new(&payload.data, payload.endianness()?);
        Ok(Self {
            logical_ports_range: read_port_list(&mut cursor)?,
        })
    }
}

// ============================================================================
// CheckLogicalPortsResponse
// ============================================================================

/// Payload of `CHECK_LOGICAL_PORT_RESPONSE`: the probed ports found open.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckLogicalPortsResponse {
    pub available_logical_ports: Vec<u16>,
}

impl CheckLogicalPortsResponse {
    pub fn serialize(&self, endianness: Endianness) -> SerializedPayload {
        let mut data = Vec::with_capacity(4 + 2 * self.available_logical_ports.len());
        write_port_list(&mut data, &self.available_logical_ports, endianness);
        SerializedPayload::new(endianness, data)
    }

    pub fn deserialize(payload: &SerializedPayload) -> CodecResult<Self> {
        let mut cursor = Cursor::new(&payload.data, payload.endianness()?);
        Ok(Self {
            available_logical_ports: read_port_list(&mut cursor)?,
        })
    }
}

// ============================================================================
// KeepAliveRequest
// ============================================================================

/// Payload of `KEEP_ALIVE_REQUEST`: the locator the sender believes the
/// session is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepAliveRequest {
    pub locator: Locator,
}

impl KeepAliveRequest {
    pub fn serialize(&self, endianness: Endianness) -> SerializedPayload {
        let mut data = Vec::with_capacity(24);
        self.locator.write(&mut data, endianness);
        SerializedPayload::new(endianness, data)
    }

    pub fn deserialize(payload: &SerializedPayload) -> CodecResult<Self> {
        let mut cursor = Cursor::new(&payload.data, payload.endianness()?);
        Ok(Self {
            locator: Locator::read(&mut cursor)?,
        })
    }
}

// ============================================================================
// LogicalPortIsClosedRequest
// ============================================================================

/// Payload of `LOGICAL_PORT_IS_CLOSED_REQUEST`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogicalPortIsClosedRequest {
    pub logical_port: u16,
}

impl LogicalPortIsClosedRequest {
    pub fn serialize(&self, endianness: Endianness) -> SerializedPayload {
        let mut data = Vec::with_capacity(2);
        put_u16(&mut data, self.logical_port, endianness);
        SerializedPayload::new(endianness, data)
    }

    pub fn deserialize(payload: &SerializedPayload) -> CodecResult<Self> {
        let mut cursor = Cursor::new(&payload.data, payload.endianness()?);
        Ok(Self {
            logical_port: cursor.read_u16()?,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CodecError, RTCP_PROTOCOL_VERSION};
    use std::net::Ipv4Addr;

    fn sample_locator() -> Locator {
        let mut locator = Locator::tcp_v4(Ipv4Addr::new(127, 0, 0, 1), 5100);
        locator.set_logical_port(7400);
        locator
    }

    #[test]
    fn test_connection_request_roundtrip() {
        let request = ConnectionRequest {
            protocol_version: RTCP_PROTOCOL_VERSION,
            transport_locator: sample_locator(),
        };

        for endianness in [Endianness::Little, Endianness::Big] {
            let payload = request.serialize(endianness);
            assert_eq!(payload.len(), 28);
            assert_eq!(ConnectionRequest::deserialize(&payload).unwrap(), request);
        }
    }

    #[test]
    fn test_connection_request_version_bytes_first() {
        let request = ConnectionRequest {
            protocol_version: ProtocolVersion::new(9, 3),
            transport_locator: sample_locator(),
        };
        let payload = request.serialize(Endianness::Little);
        assert_eq!(payload.data[0], 9);
        assert_eq!(payload.data[1], 3);
    }

    #[test]
    fn test_bind_connection_response_roundtrip() {
        let response = BindConnectionResponse {
            locator: sample_locator(),
        };
        let payload = response.serialize(Endianness::Little);
        assert_eq!(payload.len(), 24);
        assert_eq!(
            BindConnectionResponse::deserialize(&payload).unwrap(),
            response
        );
    }

    #[test]
    fn test_open_logical_port_roundtrip() {
        let request = OpenLogicalPortRequest { logical_port: 7400 };
        let payload = request.serialize(Endianness::Big);
        assert_eq!(payload.data, 7400u16.to_be_bytes());
        assert_eq!(OpenLogicalPortRequest::deserialize(&payload).unwrap(), request);
    }

    #[test]
    fn test_check_logical_ports_roundtrip() {
        let request = CheckLogicalPortsRequest {
            logical_ports_range: vec![7400, 7401, 7402],
        };
        let payload = request.serialize(Endianness::Little);
        assert_eq!(payload.len(), 4 + 6);
        assert_eq!(
            CheckLogicalPortsRequest::deserialize(&payload).unwrap(),
            request
        );

        let response = CheckLogicalPortsResponse {
            available_logical_ports: Vec::new(),
        };
        let payload = response.serialize(Endianness::Little);
        assert_eq!(payload.len(), 4);
        assert_eq!(
            CheckLogicalPortsResponse::deserialize(&payload).unwrap(),
            response
        );
    }

    #[test]
    fn test_port_list_lying_count() {
        // Count claims more elements than the payload carries.
        let mut data = Vec::new();
        put_u32(&mut data, 100, Endianness::Little);
        put_u16(&mut data, 7400, Endianness::Little);
        let payload = SerializedPayload::new(Endianness::Little, data);

        assert_eq!(
            CheckLogicalPortsRequest::deserialize(&payload),
            Err(CodecError::Truncated)
        );
    }

    #[test]
    fn test_keep_alive_roundtrip() {
        let request = KeepAliveRequest {
            locator: sample_locator(),
        };
        let payload = request.serialize(Endianness::Little);
        assert_eq!(KeepAliveRequest::deserialize(&payload).unwrap(), request);
    }

    #[test]
    fn test_logical_port_is_closed_roundtrip() {
        let request = LogicalPortIsClosedRequest { logical_port: 7410 };
        let payload = request.serialize(Endianness::Little);
        assert_eq!(
            LogicalPortIsClosedRequest::deserialize(&payload).unwrap(),
            request
        );
    }
}

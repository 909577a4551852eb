// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP locators for the RTCP control protocol.
//!
//! A locator names one endpoint of an RTPS-over-TCP session: an address
//! family tag, a 16-byte address field, the physical TCP port, and the
//! logical port multiplexed on the connection.
//!
//! # Wire Format
//!
//! Inside control message payloads a locator occupies 24 bytes:
//!
//! ```text
//! struct Locator_t {
//!     unsigned long kind;    // 4 bytes: TCPv4 (4) or TCPv6 (8)
//!     unsigned long port;    // 4 bytes: logical port << 16 | physical port
//!     octet address[16];     // IPv4 in bytes 12..16, WAN in bytes 8..12
//! };
//! ```
//!
//! TCPv6 uses all 16 address bytes and has no WAN field.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::protocol::{put_u32, CodecError, CodecResult, Cursor, Endianness};

// ============================================================================
// Constants
// ============================================================================

/// Locator kind: TCP over IPv4 (vendor extension, RTI convention).
pub const LOCATOR_KIND_TCPV4: u32 = 4;

/// Locator kind: TCP over IPv6 (vendor extension, RTI convention).
pub const LOCATOR_KIND_TCPV6: u32 = 8;

/// Serialized locator size (4 + 4 + 16 bytes).
pub const LOCATOR_SIZE: usize = 24;

// ============================================================================
// LocatorKind
// ============================================================================

/// Address family of a TCP locator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LocatorKind {
    TcpV4,
    TcpV6,
}

impl LocatorKind {
    pub fn wire_value(self) -> u32 {
        match self {
            Self::TcpV4 => LOCATOR_KIND_TCPV4,
            Self::TcpV6 => LOCATOR_KIND_TCPV6,
        }
    }

    pub fn from_wire(value: u32) -> CodecResult<Self> {
        match value {
            LOCATOR_KIND_TCPV4 => Ok(Self::TcpV4),
            LOCATOR_KIND_TCPV6 => Ok(Self::TcpV6),
            other => Err(CodecError::UnknownLocatorKind(other)),
        }
    }
}

// ============================================================================
// Locator
// ============================================================================

/// A TCP endpoint address with logical-port multiplexing information.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Locator {
    kind: LocatorKind,

    /// In-band multiplexing identifier (0 = control channel).
    logical_port: u16,

    /// TCP port.
    physical_port: u16,

    /// 16-byte address field. IPv4 occupies bytes 12..16, the optional
    /// WAN address bytes 8..12; IPv6 uses all 16 bytes.
    address: [u8; 16],
}

impl Locator {
    /// Create a TCPv4 locator. The logical port starts at 0.
    pub fn tcp_v4(addr: Ipv4Addr, physical_port: u16) -> Self {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&addr.octets());
        Self {
            kind: LocatorKind::TcpV4,
            logical_port: 0,
            physical_port,
            address,
        }
    }

    /// Create a TCPv6 locator. The logical port starts at 0.
    pub fn tcp_v6(addr: Ipv6Addr, physical_port: u16) -> Self {
        Self {
            kind: LocatorKind::TcpV6,
            logical_port: 0,
            physical_port,
            address: addr.octets(),
        }
    }

    /// Create a locator from a socket address.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::tcp_v4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => Self::tcp_v6(*v6.ip(), v6.port()),
        }
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    pub fn logical_port(&self) -> u16 {
        self.logical_port
    }

    pub fn set_logical_port(&mut self, port: u16) {
        self.logical_port = port;
    }

    pub fn physical_port(&self) -> u16 {
        self.physical_port
    }

    pub fn set_physical_port(&mut self, port: u16) {
        self.physical_port = port;
    }

    pub fn address(&self) -> &[u8; 16] {
        &self.address
    }

    /// WAN address bytes (TCPv4 only).
    pub fn wan_address(&self) -> Option<[u8; 4]> {
        match self.kind {
            LocatorKind::TcpV4 => {
                let mut wan = [0u8; 4];
                wan.copy_from_slice(&self.address[8..12]);
                Some(wan)
            }
            LocatorKind::TcpV6 => None,
        }
    }

    /// Stamp the WAN address into a TCPv4 locator. No-op for TCPv6.
    pub fn set_wan_address(&mut self, wan: [u8; 4]) {
        if self.kind == LocatorKind::TcpV4 {
            self.address[8..12].copy_from_slice(&wan);
        }
    }

    /// Convert back to a socket address using the physical port.
    pub fn to_socket_addr(&self) -> SocketAddr {
        let ip = match self.kind {
            LocatorKind::TcpV4 => IpAddr::V4(Ipv4Addr::new(
                self.address[12],
                self.address[13],
                self.address[14],
                self.address[15],
            )),
            LocatorKind::TcpV6 => IpAddr::V6(Ipv6Addr::from(self.address)),
        };
        SocketAddr::new(ip, self.physical_port)
    }

    // ========================================================================
    // Wire codec
    // ========================================================================

    /// Append the 24-byte wire form.
    pub fn write(&self, buf: &mut Vec<u8>, endianness: Endianness) {
        put_u32(buf, self.kind.wire_value(), endianness);
        let port = (u32::from(self.logical_port) << 16) | u32::from(self.physical_port);
        put_u32(buf, port, endianness);
        buf.extend_from_slice(&self.address);
    }

    /// Read the 24-byte wire form at the cursor position.
    pub(crate) fn read(cursor: &mut Cursor<'_>) -> CodecResult<Self> {
        let kind = LocatorKind::from_wire(cursor.read_u32()?)?;
        let port = cursor.read_u32()?;
        let mut address = [0u8; 16];
        address.copy_from_slice(cursor.read_bytes(16)?);
        Ok(Self {
            kind,
            logical_port: (port >> 16) as u16,
            physical_port: (port & 0xFFFF) as u16,
            address,
        })
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:logical={}",
            self.to_socket_addr(),
            self.logical_port
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-layout header codecs for RTCP control frames.
//!
//! Every control frame starts with the TCP framing header followed by the
//! control message header:
//!
//! ```text
//! +------------------- TcpHeader (10 bytes) --------------------+
//! | logical_port : u16   = 0 for control messages               |
//! | length       : u32   = total frame bytes                    |
//! | crc          : u32                                          |
//! +---------------- ControlHeader (12 bytes) -------------------+
//! | kind           : u8                                         |
//! | flags          : u8  (bit0 endianness, bit1 has_payload,    |
//! |                       bit2 requires_response)               |
//! | length         : u16                                        |
//! | transaction_id : u64                                        |
//! +-------------------------------------------------------------+
//! ```
//!
//! `ControlHeader.length` counts the control header plus the optional
//! 4-byte response code plus the optional payload envelope;
//! `TcpHeader.length` adds the TCP header itself on top.

use super::{put_u16, put_u32, put_u64, CodecResult, Cursor, Endianness};
use crate::config::RtcpConfig;

/// Endianness flag bit (set = little-endian).
pub const FLAG_ENDIANNESS: u8 = 0x01;

/// Payload-envelope-present flag bit.
pub const FLAG_HAS_PAYLOAD: u8 = 0x02;

/// Response-expected flag bit.
pub const FLAG_REQUIRES_RESPONSE: u8 = 0x04;

// ============================================================================
// TcpHeader
// ============================================================================

/// Frame header preceding every message on the TCP stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TcpHeader {
    /// Destination logical port; 0 addresses the control channel.
    pub logical_port: u16,

    /// Total frame bytes, this header included.
    pub length: u32,

    /// Wraparound-sum CRC over the frame body; 0 when CRC is disabled.
    pub crc: u32,
}

impl TcpHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 10;

    /// Append the wire form.
    pub fn write(&self, buf: &mut Vec<u8>, endianness: Endianness) {
        put_u16(buf, self.logical_port, endianness);
        put_u32(buf, self.length, endianness);
        put_u32(buf, self.crc, endianness);
    }

    /// Decode from the start of `buf`.
    pub fn read(buf: &[u8], endianness: Endianness) -> CodecResult<Self> {
        let mut cursor = Cursor::new(buf, endianness);
        Ok(Self {
            logical_port: cursor.read_u16()?,
            length: cursor.read_u32()?,
            crc: cursor.read_u32()?,
        })
    }
}

// ============================================================================
// ControlHeader
// ============================================================================

/// Control message header.
///
/// The `kind` octet is kept raw so frames with unknown kinds can still be
/// parsed and answered with `BAD_REQUEST`; use
/// [`ControlKind::from_octet`](super::ControlKind::from_octet) to classify.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlHeader {
    pub kind: u8,
    pub flags: u8,
    pub length: u16,
    pub transaction_id: u64,
}

impl ControlHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 12;

    /// Pack the three flag bits.
    pub fn set_flags(&mut self, endianness: Endianness, has_payload: bool, requires_response: bool) {
        let mut flags = 0u8;
        if endianness == Endianness::Little {
            flags |= FLAG_ENDIANNESS;
        }
        if has_payload {
            flags |= FLAG_HAS_PAYLOAD;
        }
        if requires_response {
            flags |= FLAG_REQUIRES_RESPONSE;
        }
        self.flags = flags;
    }

    /// Byte order of this message's multi-byte fields.
    pub fn endianness(&self) -> Endianness {
        if self.flags & FLAG_ENDIANNESS != 0 {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    pub fn has_payload(&self) -> bool {
        self.flags & FLAG_HAS_PAYLOAD != 0
    }

    pub fn requires_response(&self) -> bool {
        self.flags & FLAG_REQUIRES_RESPONSE != 0
    }

    /// Append the wire form in this header's own byte order.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let endianness = self.endianness();
        buf.push(self.kind);
        buf.push(self.flags);
        put_u16(buf, self.length, endianness);
        put_u64(buf, self.transaction_id, endianness);
    }

    /// Decode from the start of `buf`.
    ///
    /// The byte order of `length` and `transaction_id` comes from the flag
    /// byte of the header itself.
    pub fn read(buf: &[u8]) -> CodecResult<Self> {
        let mut cursor = Cursor::new(buf, Endianness::Little);
        let kind = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let endianness = if flags & FLAG_ENDIANNESS != 0 {
            Endianness::Little
        } else {
            Endianness::Big
        };
        cursor.set_endianness(endianness);
        Ok(Self {
            kind,
            flags,
            length: cursor.read_u16()?,
            transaction_id: cursor.read_u64()?,
        })
    }
}

// ============================================================================
// CRC
// ============================================================================

/// Fold one octet into the running CRC.
///
/// Saturating 32-bit sum where overflow wraps by `(max - data)` subtraction.
fn add_to_crc(crc: u32, octet: u8) -> u32 {
    let data = u32::from(octet);
    if crc.wrapping_add(data) < crc {
        crc - (u32::MAX - data)
    } else {
        crc + data
    }
}

/// Compute the CRC over a frame body (control header, optional response
/// code, optional payload envelope, in wire order).
pub fn compute_crc(body: &[u8]) -> u32 {
    body.iter().fold(0u32, |crc, &b| add_to_crc(crc, b))
}

/// Validate an inbound frame's CRC against its body bytes.
///
/// Always true when CRC computation is disabled in the configuration.
pub fn verify_crc(header: &TcpHeader, body: &[u8], config: &RtcpConfig) -> bool {
    !config.calculate_crc || header.crc == compute_crc(body)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_header_roundtrip() {
        let header = TcpHeader {
            logical_port: 0,
            length: 34,
            crc: 0xDEAD_BEEF,
        };

        for endianness in [Endianness::Little, Endianness::Big] {
            let mut buf = Vec::new();
            header.write(&mut buf, endianness);
            assert_eq!(buf.len(), TcpHeader::SIZE);
            assert_eq!(TcpHeader::read(&buf, endianness).unwrap(), header);
        }
    }

    #[test]
    fn test_control_header_roundtrip_le() {
        let mut header = ControlHeader {
            kind: 0xD1,
            flags: 0,
            length: 40,
            transaction_id: 0x0102_0304_0506_0708,
        };
        header.set_flags(Endianness::Little, true, true);

        let mut buf = Vec::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), ControlHeader::SIZE);

        let decoded = ControlHeader::read(&buf).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.endianness(), Endianness::Little);
        assert!(decoded.has_payload());
        assert!(decoded.requires_response());
    }

    #[test]
    fn test_control_header_roundtrip_be() {
        let mut header = ControlHeader {
            kind: 0xE1,
            flags: 0,
            length: 52,
            transaction_id: 7,
        };
        header.set_flags(Endianness::Big, true, false);

        let mut buf = Vec::new();
        header.write(&mut buf);
        // Big-endian length at offset 2.
        assert_eq!(&buf[2..4], &52u16.to_be_bytes());

        let decoded = ControlHeader::read(&buf).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.endianness(), Endianness::Big);
        assert!(!decoded.requires_response());
    }

    #[test]
    fn test_control_header_truncated() {
        let buf = [0xD1u8, 0x01, 0x00];
        assert!(ControlHeader::read(&buf).is_err());
    }

    #[test]
    fn test_crc_deterministic() {
        let body = b"the same bytes every time";
        assert_eq!(compute_crc(body), compute_crc(body));
        assert_ne!(compute_crc(body), compute_crc(b"different bytes"));
    }

    #[test]
    fn test_crc_wraparound() {
        // Drive the accumulator to the edge and over it.
        let mut crc = u32::MAX - 1;
        crc = add_to_crc(crc, 1); // exactly max, no overflow
        assert_eq!(crc, u32::MAX);
        let wrapped = add_to_crc(crc, 200);
        // Overflow path: crc - (max - data)
        assert_eq!(wrapped, u32::MAX - (u32::MAX - 200));
        assert_eq!(wrapped, 200);
    }

    #[test]
    fn test_verify_crc() {
        let body = [1u8, 2, 3, 4, 5];
        let header = TcpHeader {
            logical_port: 0,
            length: (TcpHeader::SIZE + body.len()) as u32,
            crc: compute_crc(&body),
        };

        let config = RtcpConfig::default();
        assert!(verify_crc(&header, &body, &config));
        assert!(!verify_crc(&header, &body[..4], &config));

        // Disabled CRC always verifies.
        let config = RtcpConfig::default().without_crc();
        assert!(verify_crc(&header, &body[..4], &config));
    }
}

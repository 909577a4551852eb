// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serialized payload envelope.
//!
//! When a control message carries a payload it is wrapped in an envelope:
//!
//! ```text
//! | encapsulation : u16  (PL_CDR_BE / PL_CDR_LE)   |
//! | length        : u32  (payload octet count)     |
//! | data          : length bytes                   |
//! ```
//!
//! The envelope's own `encapsulation` and `length` fields travel in the
//! byte order of the enclosing control message; the `data` bytes are
//! ordered per the encapsulation identifier.

use super::{put_u16, put_u32, CodecError, CodecResult, Cursor, Endianness};

/// Parameter-list CDR, big-endian.
pub const PL_CDR_BE: u16 = 0x0002;

/// Parameter-list CDR, little-endian.
pub const PL_CDR_LE: u16 = 0x0003;

/// Envelope bytes preceding the payload data (encapsulation + length).
pub const ENVELOPE_OVERHEAD: usize = 6;

/// A payload envelope: encapsulation identifier plus serialized bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerializedPayload {
    pub encapsulation: u16,
    pub data: Vec<u8>,
}

impl SerializedPayload {
    /// Wrap already-serialized bytes under the given byte order.
    pub fn new(endianness: Endianness, data: Vec<u8>) -> Self {
        Self {
            encapsulation: match endianness {
                Endianness::Big => PL_CDR_BE,
                Endianness::Little => PL_CDR_LE,
            },
            data,
        }
    }

    /// Payload octet count (the envelope `length` field).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte order declared by the encapsulation identifier.
    pub fn endianness(&self) -> CodecResult<Endianness> {
        match self.encapsulation {
            PL_CDR_BE => Ok(Endianness::Big),
            PL_CDR_LE => Ok(Endianness::Little),
            other => Err(CodecError::UnknownEncapsulation(other)),
        }
    }

    /// Append the envelope (encapsulation, length, data).
    pub fn write(&self, buf: &mut Vec<u8>, endianness: Endianness) {
        put_u16(buf, self.encapsulation, endianness);
        put_u32(buf, self.data.len() as u32, endianness);
        buf.extend_from_slice(&self.data);
    }

    /// Read an envelope at the cursor position.
    pub(crate) fn read(cursor: &mut Cursor<'_>) -> CodecResult<Self> {
        let encapsulation = cursor.read_u16()?;
        let length = cursor.read_u32()? as usize;
        let data = cursor.read_bytes(length)?.to_vec();
        Ok(Self {
            encapsulation,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let payload = SerializedPayload::new(Endianness::Little, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(payload.encapsulation, PL_CDR_LE);
        assert_eq!(payload.len(), 3);

        let mut buf = Vec::new();
        payload.write(&mut buf, Endianness::Little);
        assert_eq!(buf.len(), ENVELOPE_OVERHEAD + 3);

        let mut cursor = Cursor::new(&buf, Endianness::Little);
        let decoded = SerializedPayload::read(&mut cursor).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_envelope_endianness_mixed() {
        // Big-endian message framing around a little-endian payload.
        let payload = SerializedPayload::new(Endianness::Little, vec![1, 2, 3, 4]);
        let mut buf = Vec::new();
        payload.write(&mut buf, Endianness::Big);

        assert_eq!(&buf[..2], &PL_CDR_LE.to_be_bytes());
        assert_eq!(&buf[2..6], &4u32.to_be_bytes());

        let mut cursor = Cursor::new(&buf, Endianness::Big);
        let decoded = SerializedPayload::read(&mut cursor).unwrap();
        assert_eq!(decoded.endianness().unwrap(), Endianness::Little);
        assert_eq!(decoded.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_envelope_truncated_data() {
        let payload = SerializedPayload::new(Endianness::Little, vec![9; 40]);
        let mut buf = Vec::new();
        payload.write(&mut buf, Endianness::Little);

        let mut cursor = Cursor::new(&buf[..30], Endianness::Little);
        assert_eq!(
            SerializedPayload::read(&mut cursor),
            Err(CodecError::Truncated)
        );
    }

    #[test]
    fn test_unknown_encapsulation() {
        let payload = SerializedPayload {
            encapsulation: 0x1234,
            data: Vec::new(),
        };
        assert_eq!(
            payload.endianness(),
            Err(CodecError::UnknownEncapsulation(0x1234))
        );
    }
}

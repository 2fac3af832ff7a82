//! The 16-byte packet header: sync pattern, type, length, checksum, timestamp.

/// Size in bytes of the fixed packet header.
pub const HEADER_SIZE: usize = 16;

/// Three-byte sync pattern marking the start of every framed packet.
pub const SYNC_BYTES: [u8; 3] = [0xA3, 0x9D, 0x7A];

/// Byte offset of the low checksum byte within the header.
const CHECKSUM_LOW: usize = 6;
/// Byte offset of the high checksum byte within the header.
const CHECKSUM_HIGH: usize = 7;

/// A decoded packet header.
///
/// Field order matches the unpacked-tuple indices of the legacy wire format
/// (`type=3, length=4, checksum=5, ts_upper=6, ts_lower=7`), not the raw byte
/// offsets; callers never need the raw offsets once a header is decoded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    /// Raw packet type byte; validated against [`crate::PacketType`] by the caller.
    pub packet_type: u8,
    /// Total packet length, header included, as transmitted on the wire.
    pub total_length: u16,
    /// Checksum as transmitted on the wire.
    pub checksum: u16,
    /// Integer-seconds half of the NTP timestamp.
    pub timestamp_upper: u32,
    /// Fractional half of the NTP timestamp, in the sender's native units.
    pub timestamp_lower: u32,
}

impl Header {
    /// Payload length implied by `total_length`, i.e. `total_length - HEADER_SIZE`.
    #[must_use]
    pub const fn payload_length(&self) -> u16 {
        self.total_length - HEADER_SIZE as u16
    }
}

/// Errors returned by [`decode_header`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum HeaderError {
    /// The first three bytes did not match [`SYNC_BYTES`].
    #[error("bad sync pattern: expected a3 9d 7a, got {found:02x?}")]
    BadSync {
        /// The three bytes actually present at the start of the header.
        found: [u8; 3],
    },
    /// `total_length` was smaller than [`HEADER_SIZE`], which would make the
    /// payload length underflow.
    #[error("bad packet length: total length {total_length} is smaller than the header ({HEADER_SIZE} bytes)")]
    BadLength {
        /// The `total_length` field as read off the wire.
        total_length: u16,
    },
}

/// Decodes a 16-byte big-endian header.
///
/// Validates the sync pattern and rejects a `total_length` smaller than the
/// header itself; it does not validate the checksum, which is the caller's
/// responsibility via [`crate::Packet::verify`].
pub fn decode_header(bytes: &[u8; HEADER_SIZE]) -> Result<Header, HeaderError> {
    let sync = [bytes[0], bytes[1], bytes[2]];
    if sync != SYNC_BYTES {
        return Err(HeaderError::BadSync { found: sync });
    }

    let packet_type = bytes[3];
    let total_length = u16::from_be_bytes([bytes[4], bytes[5]]);
    if total_length < HEADER_SIZE as u16 {
        return Err(HeaderError::BadLength { total_length });
    }
    let checksum = u16::from_be_bytes([bytes[6], bytes[7]]);
    let timestamp_upper = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let timestamp_lower = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    Ok(Header {
        packet_type,
        total_length,
        checksum,
        timestamp_upper,
        timestamp_lower,
    })
}

/// Encodes a header for test fixtures that synthesize packets as if they came
/// from a port agent.
///
/// This is the only place a header is ever produced by this crate: the client
/// never prepends a header to outbound data-port traffic (see the crate-level
/// docs). The checksum field is left zeroed in the encoded bytes, matching the
/// legacy behavior this codec preserves bit-exactly — the real checksum is
/// computed separately via [`crate::checksum`] and compared, never written
/// back into the header buffer.
#[must_use]
pub fn encode_header(packet_type: u8, payload_len: u16, timestamp: (u32, u32)) -> [u8; HEADER_SIZE] {
    let total_length = HEADER_SIZE as u16 + payload_len;
    let mut header = [0u8; HEADER_SIZE];
    header[0..3].copy_from_slice(&SYNC_BYTES);
    header[3] = packet_type;
    header[4..6].copy_from_slice(&total_length.to_be_bytes());
    header[CHECKSUM_LOW] = 0;
    header[CHECKSUM_HIGH] = 0;
    header[8..12].copy_from_slice(&timestamp.0.to_be_bytes());
    header[12..16].copy_from_slice(&timestamp.1.to_be_bytes());
    header
}

//! The decoded [`Packet`] and its [`PacketType`] tag.

use crate::checksum::checksum;
use crate::header::{HEADER_SIZE, Header, decode_header, encode_header};
use crate::ntp::ntp_now;

/// The kind of a port agent packet, per the port agent wire protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PacketType {
    /// Raw bytes read from the instrument.
    DataFromInstrument,
    /// Raw bytes the driver sent to the instrument.
    DataFromDriver,
    /// A command sent to the port agent itself.
    PortAgentCommand,
    /// A status report from the port agent.
    PortAgentStatus,
    /// A fault report from the port agent.
    PortAgentFault,
    /// A command destined for the instrument.
    InstrumentCommand,
    /// A liveness packet; resets the heartbeat watchdog and carries no payload callback.
    Heartbeat,
}

/// The raw type byte did not match any known [`PacketType`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown port agent packet type: {0}")]
pub struct PacketTypeError(pub u8);

impl TryFrom<u8> for PacketType {
    type Error = PacketTypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::DataFromInstrument),
            2 => Ok(Self::DataFromDriver),
            3 => Ok(Self::PortAgentCommand),
            4 => Ok(Self::PortAgentStatus),
            5 => Ok(Self::PortAgentFault),
            6 => Ok(Self::InstrumentCommand),
            7 => Ok(Self::Heartbeat),
            other => Err(PacketTypeError(other)),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        match value {
            PacketType::DataFromInstrument => 1,
            PacketType::DataFromDriver => 2,
            PacketType::PortAgentCommand => 3,
            PacketType::PortAgentStatus => 4,
            PacketType::PortAgentFault => 5,
            PacketType::InstrumentCommand => 6,
            PacketType::Heartbeat => 7,
        }
    }
}

/// A fully assembled port agent packet: header fields plus payload.
///
/// A `Packet` is only ever constructed once both the header and the full
/// payload have been read off the wire (see the frame reader in
/// `port-agent-client`); there is no partially-assembled state visible
/// outside that crate. `valid` starts `false` and is only set by
/// [`Packet::verify`] — a packet that has never been verified is neither
/// valid nor invalid, it simply hasn't been checked yet.
#[derive(Clone, Debug)]
pub struct Packet {
    packet_type_raw: u8,
    transmitted_checksum: u16,
    timestamp: (u32, u32),
    payload: Vec<u8>,
    valid: bool,
}

impl Packet {
    /// Assembles a packet from a decoded header and its matching payload.
    ///
    /// `payload.len()` must equal `header.payload_length()`; this is an
    /// invariant of the frame reader, not re-checked here.
    #[must_use]
    pub fn from_header_and_payload(header: Header, payload: Vec<u8>) -> Self {
        Self {
            packet_type_raw: header.packet_type,
            transmitted_checksum: header.checksum,
            timestamp: (header.timestamp_upper, header.timestamp_lower),
            payload,
            valid: false,
        }
    }

    /// Builds a packet as if it had arrived over the wire, for test fixtures.
    ///
    /// Encodes a header via [`encode_header`], computes the true checksum over
    /// that header and `payload`, and stores the checksum as the packet's
    /// transmitted value so that [`Packet::verify`] succeeds on the result.
    #[must_use]
    pub fn encode_for_test(packet_type: PacketType, payload: Vec<u8>) -> Self {
        let timestamp = ntp_now();
        let header_bytes = encode_header(packet_type.into(), payload.len() as u16, timestamp);
        let transmitted_checksum = checksum(&header_bytes, &payload);
        Self {
            packet_type_raw: packet_type.into(),
            transmitted_checksum,
            timestamp,
            payload,
            valid: false,
        }
    }

    /// Decodes a packet from raw header bytes and a matching payload slice.
    ///
    /// This is a convenience wrapper around [`decode_header`] plus
    /// [`Packet::from_header_and_payload`] for callers (tests, fixtures) that
    /// have full frames in memory already; the frame reader itself decodes
    /// the header as soon as it has 16 bytes, before the payload has arrived.
    pub fn decode(header_bytes: &[u8; HEADER_SIZE], payload: Vec<u8>) -> Result<Self, crate::HeaderError> {
        let header = decode_header(header_bytes)?;
        Ok(Self::from_header_and_payload(header, payload))
    }

    /// The packet's raw type byte.
    #[must_use]
    pub const fn type_raw(&self) -> u8 {
        self.packet_type_raw
    }

    /// The packet's type, if it is one of the known [`PacketType`] variants.
    pub fn packet_type(&self) -> Result<PacketType, PacketTypeError> {
        PacketType::try_from(self.packet_type_raw)
    }

    /// The payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload length in bytes.
    #[must_use]
    pub fn payload_length(&self) -> usize {
        self.payload.len()
    }

    /// The NTP-epoch `(seconds, fractional)` timestamp as carried on the wire.
    #[must_use]
    pub const fn timestamp(&self) -> (u32, u32) {
        self.timestamp
    }

    /// The checksum as transmitted on the wire.
    #[must_use]
    pub const fn transmitted_checksum(&self) -> u16 {
        self.transmitted_checksum
    }

    /// Whether the packet has passed [`Packet::verify`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Recomputes the checksum over this packet's header fields and payload
    /// and compares it against the transmitted value, setting and returning
    /// [`Packet::is_valid`].
    ///
    /// A failed verification is not a protocol-level fault: the packet still
    /// reaches the caller's callback with `valid=false`, so policy on corrupt
    /// frames is left to the caller.
    pub fn verify(&mut self) -> bool {
        let header_bytes = encode_header(
            self.packet_type_raw,
            self.payload.len() as u16,
            self.timestamp,
        );
        let computed = checksum(&header_bytes, &self.payload);
        self.valid = computed == self.transmitted_checksum;
        self.valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_for_test_round_trips_through_verify() {
        let mut packet =
            Packet::encode_for_test(PacketType::DataFromInstrument, vec![0x48, 0x49]);
        assert!(packet.verify());
        assert!(packet.is_valid());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let mut packet = Packet::encode_for_test(PacketType::Heartbeat, vec![1, 2, 3]);
        packet.payload[0] ^= 0xff;
        assert!(!packet.verify());
        assert!(!packet.is_valid());
    }

    #[test]
    fn clean_fixture_decodes_and_verifies() {
        // A3 9D 7A 01 00 12 <checksum> | 00 00 00 01 00 00 00 00 | 48 49
        let payload = vec![0x48, 0x49];
        let mut header_bytes = encode_header(1, payload.len() as u16, (1, 0));
        let sum = checksum(&header_bytes, &payload);
        header_bytes[6..8].copy_from_slice(&sum.to_be_bytes());

        let mut decoded = Header {
            packet_type: header_bytes[3],
            total_length: u16::from_be_bytes([header_bytes[4], header_bytes[5]]),
            checksum: sum,
            timestamp_upper: 1,
            timestamp_lower: 0,
        };
        // decode_header would normally supply this; constructed directly here
        // because the fixture carries a non-zero checksum that encode_header
        // never writes.
        decoded.checksum = sum;

        let mut packet = Packet::from_header_and_payload(decoded, payload.clone());
        assert_eq!(packet.packet_type(), Ok(PacketType::DataFromInstrument));
        assert_eq!(packet.payload(), payload.as_slice());
        assert!(packet.verify());
    }

    #[test]
    fn unknown_type_byte_is_reported() {
        let packet = Packet::from_header_and_payload(
            Header {
                packet_type: 42,
                total_length: HEADER_SIZE as u16,
                checksum: 0,
                timestamp_upper: 0,
                timestamp_lower: 0,
            },
            Vec::new(),
        );
        assert_eq!(packet.packet_type(), Err(PacketTypeError(42)));
    }
}

//! Framed binary packet codec for the port agent wire protocol.
//!
//! A port agent packet is a 16-byte big-endian header followed by a
//! variable-length payload. This crate decodes and encodes that header,
//! computes the legacy checksum, and exposes a [`Packet`] type that higher
//! layers verify and dispatch on. It performs no I/O of its own; assembling
//! header and payload bytes off a socket is the job of the `port-agent-client`
//! crate's frame reader.

mod checksum;
mod header;
mod ntp;
mod packet;

pub use checksum::checksum;
pub use header::{HEADER_SIZE, Header, HeaderError, SYNC_BYTES, decode_header, encode_header};
pub use ntp::ntp_now;
pub use packet::{Packet, PacketType, PacketTypeError};

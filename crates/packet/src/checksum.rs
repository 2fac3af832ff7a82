//! The legacy port agent checksum.

use crate::header::HEADER_SIZE;

/// Byte offset of the low checksum byte within the header.
const CHECKSUM_LOW: usize = 6;
/// Byte offset of the high checksum byte within the header.
const CHECKSUM_HIGH: usize = 7;

/// Computes the port agent checksum over a header and payload.
///
/// Defined as the unsigned 16-bit sum (wrapping on overflow) of every header
/// byte treated as an unsigned 8-bit value, skipping the two checksum-field
/// bytes at offsets 6 and 7, plus the unsigned sum of every payload byte.
/// This is a legacy wire format detail and must be preserved bit-exactly;
/// it is not a general-purpose checksum algorithm.
#[must_use]
pub fn checksum(header: &[u8; HEADER_SIZE], payload: &[u8]) -> u16 {
    let mut sum: u16 = 0;
    for (i, byte) in header.iter().enumerate() {
        if i < CHECKSUM_LOW || i > CHECKSUM_HIGH {
            sum = sum.wrapping_add(u16::from(*byte));
        }
    }
    for byte in payload {
        sum = sum.wrapping_add(u16::from(*byte));
    }
    sum
}

//! NTP-epoch timestamp helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1 Jan 1900 UTC) and the Unix epoch (1 Jan 1970 UTC).
const NTP_DELTA_SECS: u32 = 2_208_988_800;

/// Returns the current time as an NTP-epoch `(seconds, fractional)` pair,
/// suitable for stamping outbound test fixtures via [`crate::encode_header`].
///
/// `fractional` carries the sub-second portion of the current Unix time
/// expressed in nanoseconds, matching the precision available from
/// [`SystemTime`]; real port agents emit their own sender-defined fractional
/// units, so this is only meaningful for locally synthesized frames.
#[must_use]
pub fn ntp_now() -> (u32, u32) {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let upper = since_epoch.as_secs() as u32 + NTP_DELTA_SECS;
    let lower = since_epoch.subsec_nanos();
    (upper, lower)
}

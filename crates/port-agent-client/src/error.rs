//! The client's error taxonomy.

use std::io;

/// Errors surfaced by the port agent client.
///
/// Every variant here corresponds to an escalation path that eventually
/// reaches the Recovery Controller and, if recovery is exhausted, the
/// caller's `on_error` callback. A failed checksum is deliberately **not**
/// represented here: it is carried on `Packet::is_valid` and never escalates
/// on its own (see [`packet::Packet::verify`]).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A required piece of configuration (typically the command port) was
    /// missing when an operation that needs it was invoked.
    #[error("missing required port agent configuration: {message}")]
    ConnectionConfigError {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// Establishing the TCP connection failed.
    #[error("failed to connect to port agent at {host}:{port}: {source}")]
    ConnectIoError {
        /// Remote host.
        host: String,
        /// Remote port.
        port: u16,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The data socket returned a zero-byte read, meaning the peer closed
    /// the connection.
    #[error("port agent at {host}:{port} closed the data connection")]
    ReadClosed {
        /// Remote host.
        host: String,
        /// Remote port.
        port: u16,
    },

    /// A socket error occurred while reading from the data socket that was
    /// not a transient would-block condition.
    #[error("socket error while reading from port agent: {source}")]
    ReadIoError {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The send path retried past `MAX_SEND_ATTEMPTS` would-block conditions.
    #[error("send would-block attempts ({attempts}) exceeded while sending to {peer}; {sent} bytes sent")]
    SendWouldBlockExceeded {
        /// Number of would-block retries attempted.
        attempts: u32,
        /// Bytes successfully sent before giving up.
        sent: usize,
        /// Best-effort description of the remote peer.
        peer: String,
    },

    /// A non-transient socket error occurred while writing.
    #[error("socket error while sending to {peer}: {source}")]
    SendIoError {
        /// Best-effort description of the remote peer.
        peer: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// `max_missed_heartbeats` consecutive heartbeat expirations elapsed
    /// with no heartbeat received in between.
    #[error("Maximum allowable Port Agent heartbeats ({max_missed}) missed!")]
    HeartbeatTimeout {
        /// The configured missed-heartbeat ceiling.
        max_missed: u32,
    },
}

impl ClientError {
    /// Returns the message text that would be handed to a registered
    /// `on_error` callback: the `Display` rendering, without the error
    /// source chain appended.
    #[must_use]
    pub fn callback_message(&self) -> String {
        self.to_string()
    }
}

/// Maximum heartbeat interval accepted by [`crate::watchdog::Watchdog`], in seconds.
pub const MAX_HEARTBEAT_INTERVAL: u32 = 20;

/// Range validation failure for heartbeat configuration.
#[derive(Debug, thiserror::Error)]
#[error("heartbeat interval {0} out of range: must be between 0 and {MAX_HEARTBEAT_INTERVAL} seconds")]
pub struct HeartbeatRangeError(pub u32);

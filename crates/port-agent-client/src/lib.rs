//! A long-lived TCP client for the port agent relay protocol.
//!
//! A [`Client`] connects to a port agent's data port, verifies and dispatches
//! the framed packets it receives, tracks liveness via periodic `HEARTBEAT`
//! packets, and recovers from a single connection fault with one bounded
//! reconnect attempt before surfacing the failure to the caller's `on_error`
//! callback.
//!
//! ```no_run
//! use port_agent_client::{Callbacks, Client, Config};
//!
//! let config = Config::builder("localhost", 4001)
//!     .command_port(4002)
//!     .build();
//! let callbacks = Callbacks::new()
//!     .on_data(|packet| println!("{} bytes of instrument data", packet.payload_length()))
//!     .on_error(|message| eprintln!("port agent client error: {message}"));
//!
//! let client = Client::new(config, callbacks);
//! client.init_comms().expect("initial connection failed");
//! ```

mod callbacks;
mod client;
mod config;
mod error;
mod recovery;
mod reader;
mod send;
mod watchdog;

pub use callbacks::Callbacks;
pub use client::Client;
pub use config::{Config, ConfigBuilder};
pub use error::{ClientError, HeartbeatRangeError, MAX_HEARTBEAT_INTERVAL};
pub use recovery::MAX_RECOVERY_ATTEMPTS;
pub use send::MAX_SEND_ATTEMPTS;
pub use watchdog::DEFAULT_MAX_MISSED_HEARTBEATS;

pub use packet::{Packet, PacketType, PacketTypeError};

//! The frame reader: assembles one [`Packet`] at a time off the data socket.

use std::io::{self, Read};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use packet::{HEADER_SIZE, Packet, PacketType, decode_header};

use crate::callbacks::Callbacks;
use crate::error::ClientError;
use crate::watchdog::Watchdog;

/// Sleep applied when a read returns a transient would-block error.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(100);

type FatalFn = dyn Fn(ClientError) + Send + Sync;
type PeerFn = dyn Fn() -> String + Send + Sync;

/// A running frame reader.
///
/// Exactly one `Reader` is attached to a data socket for its lifetime; it
/// owns no state the [`crate::Client`] facade needs back except the join
/// handle and the shared `done` flag used to request a clean shutdown.
pub struct Reader {
    done: Arc<AtomicBool>,
    thread_id: thread::ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl Reader {
    /// Spawns the reader thread.
    ///
    /// `on_fatal` is invoked exactly once, from the reader thread, the first
    /// time a non-recoverable condition is observed (peer closed or a
    /// non-transient socket error); the reader thread exits immediately
    /// afterward.
    pub fn spawn(
        mut stream: TcpStream,
        callbacks: Arc<Callbacks>,
        watchdog: Watchdog,
        on_fatal: Arc<FatalFn>,
        peer: Arc<PeerFn>,
    ) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let done_for_thread = Arc::clone(&done);

        let handle = thread::spawn(move || {
            run(&mut stream, &done_for_thread, &callbacks, &watchdog, &on_fatal, &peer);
        });
        let thread_id = handle.thread().id();

        Self {
            done,
            thread_id,
            handle: Some(handle),
        }
    }

    /// Requests the reader thread stop at its next opportunity.
    pub fn signal_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    /// Waits for the reader thread to exit.
    ///
    /// `on_fatal` runs synchronously on the reader thread itself, and may
    /// unwind back here (via the client's error handling) before `run` has
    /// returned. Joining a thread from within itself would deadlock, so in
    /// that case this just drops the handle: `done` is already set, and the
    /// thread is moments from returning on its own.
    pub fn join(&mut self) {
        if thread::current().id() == self.thread_id {
            self.handle = None;
            return;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.signal_done();
        self.join();
    }
}

/// Outcome of reading an exact number of bytes off a non-blocking socket.
enum ReadExact {
    Got(Vec<u8>),
    PeerClosed,
    Stopped,
    Io(io::Error),
}

fn read_exact_nonblocking(stream: &mut TcpStream, len: usize, done: &AtomicBool) -> ReadExact {
    let mut buf = vec![0u8; len];
    let mut filled = 0usize;

    while filled < len {
        if done.load(Ordering::SeqCst) {
            return ReadExact::Stopped;
        }
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return ReadExact::PeerClosed,
            Ok(n) => filled += n,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(WOULD_BLOCK_BACKOFF);
            }
            Err(error) => return ReadExact::Io(error),
        }
    }

    ReadExact::Got(buf)
}

fn run(
    stream: &mut TcpStream,
    done: &Arc<AtomicBool>,
    callbacks: &Arc<Callbacks>,
    watchdog: &Watchdog,
    on_fatal: &FatalFn,
    peer: &PeerFn,
) {
    #[cfg(feature = "tracing")]
    tracing::info!("port agent frame reader started");

    watchdog.start();

    while !done.load(Ordering::SeqCst) {
        let header_bytes = match read_exact_nonblocking(stream, HEADER_SIZE, done) {
            ReadExact::Got(bytes) => bytes,
            ReadExact::Stopped => break,
            ReadExact::PeerClosed => {
                escalate_closed(peer, on_fatal);
                break;
            }
            ReadExact::Io(source) => {
                on_fatal(ClientError::ReadIoError { source });
                break;
            }
        };

        let mut header_array = [0u8; HEADER_SIZE];
        header_array.copy_from_slice(&header_bytes);
        let header = match decode_header(&header_array) {
            Ok(header) => header,
            Err(_bad_header) => {
                // A malformed header on an otherwise-healthy stream means the
                // framing itself is lost; there is no way to resynchronize,
                // so this is treated the same as a closed connection.
                escalate_closed(peer, on_fatal);
                break;
            }
        };

        let payload = match read_exact_nonblocking(stream, header.payload_length() as usize, done)
        {
            ReadExact::Got(bytes) => bytes,
            ReadExact::Stopped => break,
            ReadExact::PeerClosed => {
                escalate_closed(peer, on_fatal);
                break;
            }
            ReadExact::Io(source) => {
                on_fatal(ClientError::ReadIoError { source });
                break;
            }
        };

        let mut packet = Packet::from_header_and_payload(header, payload);
        dispatch(&mut packet, callbacks, watchdog);
    }

    #[cfg(feature = "tracing")]
    tracing::info!("port agent frame reader stopped");
}

fn escalate_closed(peer: &PeerFn, on_fatal: &FatalFn) {
    let description = peer();
    let (host, port) = description
        .rsplit_once(':')
        .map_or((description.clone(), 0), |(h, p)| {
            (h.to_string(), p.parse().unwrap_or(0))
        });
    on_fatal(ClientError::ReadClosed { host, port });
}

fn dispatch(packet: &mut Packet, callbacks: &Arc<Callbacks>, watchdog: &Watchdog) {
    let Ok(packet_type) = packet.packet_type() else {
        // An unrecognized type byte still gets surfaced on the raw channel;
        // policy on unknown types is a matter for the caller, not this crate.
        callbacks.dispatch_raw(packet);
        return;
    };

    match packet_type {
        PacketType::DataFromInstrument => {
            callbacks.dispatch_raw(packet);
            callbacks.dispatch_data(packet);
        }
        PacketType::DataFromDriver
        | PacketType::PortAgentCommand
        | PacketType::PortAgentStatus
        | PacketType::PortAgentFault
        | PacketType::InstrumentCommand => {
            callbacks.dispatch_raw(packet);
        }
        PacketType::Heartbeat => {
            watchdog.reset();
        }
    }
}

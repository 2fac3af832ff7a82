//! A fake port agent used to drive [`port-agent-client`](../port_agent_client)
//! integration tests: a loopback data socket the test can hand-feed wire
//! frames into, and a command-port recorder that captures what the client
//! sends back.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use packet::{HEADER_SIZE, PacketType, checksum, encode_header, ntp_now};

/// Builds a complete wire frame (header + payload) with a correctly computed
/// checksum, as a real port agent would send one.
#[must_use]
pub fn encode_frame(packet_type: PacketType, payload: &[u8]) -> Vec<u8> {
    let timestamp = ntp_now();
    let mut header = encode_header(packet_type.into(), payload.len() as u16, timestamp);
    let sum = checksum(&header, payload);
    header[6..8].copy_from_slice(&sum.to_be_bytes());

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    frame
}

/// A loopback TCP listener standing in for a port agent's data port.
///
/// Tests bind one, hand its [`FakePortAgent::port`] to a `Config`, then call
/// [`FakePortAgent::accept`] once the client under test connects.
pub struct FakePortAgent {
    listener: TcpListener,
}

impl FakePortAgent {
    /// Binds to an OS-assigned loopback port.
    #[must_use]
    pub fn bind() -> Self {
        let listener =
            TcpListener::bind(("127.0.0.1", 0)).expect("bind loopback fake port agent listener");
        Self { listener }
    }

    /// The port the listener bound to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .expect("bound listener has a local address")
            .port()
    }

    /// Blocks until a client connects, returning the accepted stream.
    pub fn accept(&self) -> TcpStream {
        self.listener
            .accept()
            .expect("accept a connection on the fake port agent listener")
            .0
    }
}

/// Records every byte sequence sent to an ephemeral command-port connection.
///
/// The port agent client opens one short-lived TCP connection per command
/// (`send_break`, `set_heartbeat_interval`); this recorder accepts each one on
/// a background thread, reads it to EOF, and stores the bytes as a `String`.
pub struct CommandRecorder {
    listener_port: u16,
    received: Arc<Mutex<Vec<String>>>,
    stop: Arc<std::sync::atomic::AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CommandRecorder {
    /// Binds to an OS-assigned loopback port and starts accepting commands.
    #[must_use]
    pub fn bind() -> Self {
        let listener =
            TcpListener::bind(("127.0.0.1", 0)).expect("bind loopback command recorder listener");
        listener
            .set_nonblocking(true)
            .expect("set command recorder listener non-blocking");
        let listener_port = listener
            .local_addr()
            .expect("bound listener has a local address")
            .port();

        let received = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let received_thread = Arc::clone(&received);
        let stop_thread = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            use std::sync::atomic::Ordering;
            while !stop_thread.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((mut stream, _addr)) => {
                        let mut buf = Vec::new();
                        let _ = stream.read_to_end(&mut buf);
                        received_thread
                            .lock()
                            .expect("command recorder buffer lock poisoned")
                            .push(String::from_utf8_lossy(&buf).into_owned());
                    }
                    Err(ref error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            listener_port,
            received,
            stop,
            handle: Some(handle),
        }
    }

    /// The port commands should be sent to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.listener_port
    }

    /// Every command received so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        self.received
            .lock()
            .expect("command recorder buffer lock poisoned")
            .clone()
    }
}

impl Drop for CommandRecorder {
    fn drop(&mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Sends raw bytes over `stream`, matching what a real port agent would write
/// directly to the data socket with no framing.
pub fn write_raw(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).expect("write raw bytes to fake port agent stream");
}

//! The client facade: the single entry point consumers use.

use std::io::Write;
use std::net::TcpStream;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use crate::callbacks::Callbacks;
use crate::config::Config;
use crate::error::ClientError;
use crate::reader::Reader;
use crate::recovery::RecoveryController;
use crate::send::send_all;
use crate::watchdog::Watchdog;

/// Delay before a reconnect attempt is made after `init_comms` fails outright
/// (i.e. before any data has ever flowed), matching the fixed backoff the
/// port agent protocol has always used here.
const RECOVERY_SLEEP_TIME: Duration = Duration::from_secs(2);

/// Sent on the command port to request an instrument break condition.
const BREAK_COMMAND: &str = "break";

/// Prefix for the heartbeat-interval command; the interval value is appended
/// directly with no separator, matching `port_agent_client.py`'s
/// `HEARTBEAT_INTERVAL_COMMAND = "heartbeat_interval "`.
const HEARTBEAT_INTERVAL_COMMAND: &str = "heartbeat_interval ";

/// Builds the exact command string sent on the command port to set the
/// heartbeat interval, with no added terminator.
fn heartbeat_interval_command(interval_secs: u32) -> String {
    format!("{HEARTBEAT_INTERVAL_COMMAND}{interval_secs}")
}

/// Current heartbeat configuration, held behind a mutex so
/// `set_heartbeat_interval` can swap it out from any thread.
struct HeartbeatSettings {
    interval_secs: u32,
    max_missed: u32,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            max_missed: crate::watchdog::DEFAULT_MAX_MISSED_HEARTBEATS,
        }
    }
}

/// A long-lived connection to a port agent.
///
/// Always held as `Arc<Client>`: the reader thread and the heartbeat
/// watchdog's timer thread each hold a [`Weak`] reference back into the
/// client so they can report a fatal condition without owning the client
/// for their entire lifetime.
pub struct Client {
    config: Config,
    callbacks: Arc<Callbacks>,
    recovery: RecoveryController,
    heartbeat: Mutex<HeartbeatSettings>,
    watchdog: Mutex<Watchdog>,
    reader: Mutex<Option<Reader>>,
    data_stream: Mutex<Option<TcpStream>>,
    self_weak: Weak<Client>,
}

impl Client {
    /// Builds a client for `config`, wired to `callbacks`.
    ///
    /// Does not connect; call [`Client::init_comms`] to do that.
    #[must_use]
    pub fn new(config: Config, callbacks: Callbacks) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            callbacks: Arc::new(callbacks),
            recovery: RecoveryController::new(),
            heartbeat: Mutex::new(HeartbeatSettings::default()),
            watchdog: Mutex::new(Watchdog::new(0, 0, || {}).expect("zero interval is always valid")),
            reader: Mutex::new(None),
            data_stream: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }

    /// Establishes the data socket, pushes the current heartbeat interval to
    /// the port agent over the command port, then starts the frame reader and
    /// heartbeat watchdog.
    ///
    /// The heartbeat push is best-effort: a client with no command port
    /// configured is a supported configuration (it simply never hears a
    /// remote heartbeat), so a missing command port here does not fail the
    /// connection — only the explicit [`Client::send_break`] and
    /// [`Client::set_heartbeat_interval`] calls treat it as a hard error.
    ///
    /// On failure to connect the data socket, sleeps [`RECOVERY_SLEEP_TIME`]
    /// and routes the error through the same recovery path used for faults
    /// discovered after a connection is already up, so a failed first
    /// connection still gets exactly one bounded retry.
    pub fn init_comms(&self) -> Result<(), ClientError> {
        match self.connect_data_socket() {
            Ok(stream) => {
                self.push_initial_heartbeat_config();
                self.install_stream(stream);
                Ok(())
            }
            Err(error) => {
                let message = error.callback_message();
                thread::sleep(RECOVERY_SLEEP_TIME);
                self.handle_fatal_message(&message);
                Err(error)
            }
        }
    }

    /// Sends the currently configured heartbeat interval to the port agent,
    /// as the first command-port operation of a fresh connection.
    fn push_initial_heartbeat_config(&self) {
        let interval_secs = self.heartbeat.lock().expect("heartbeat lock poisoned").interval_secs;
        if let Err(error) = self.send_command(&heartbeat_interval_command(interval_secs)) {
            #[cfg(feature = "tracing")]
            tracing::debug!(%error, "could not push initial heartbeat interval to port agent");
            let _ = error;
        }
    }

    fn connect_data_socket(&self) -> Result<TcpStream, ClientError> {
        let host = self.config.host().to_string();
        let port = self.config.data_port();
        #[cfg(feature = "tracing")]
        tracing::info!(host = %host, port, "connecting to port agent data socket");

        let stream =
            TcpStream::connect((host.as_str(), port)).map_err(|source| ClientError::ConnectIoError {
                host: host.clone(),
                port,
                source,
            })?;
        stream
            .set_nodelay(true)
            .map_err(|source| ClientError::ConnectIoError {
                host: host.clone(),
                port,
                source,
            })?;
        stream
            .set_nonblocking(true)
            .map_err(|source| ClientError::ConnectIoError { host, port, source })?;
        Ok(stream)
    }

    fn install_stream(&self, stream: TcpStream) {
        let reader_stream = stream
            .try_clone()
            .expect("cloning a connected TcpStream handle does not fail");

        *self.data_stream.lock().expect("data stream lock poisoned") = Some(stream);

        let (interval_secs, max_missed) = {
            let settings = self.heartbeat.lock().expect("heartbeat lock poisoned");
            (settings.interval_secs, settings.max_missed)
        };

        let watchdog_weak = self.self_weak.clone();
        let watchdog = Watchdog::new(interval_secs, max_missed, move || {
            if let Some(client) = watchdog_weak.upgrade() {
                client.handle_heartbeat_timeout();
            }
        })
        .expect("heartbeat interval was already validated by set_heartbeat_interval");

        let callbacks = Arc::clone(&self.callbacks);
        let reader_weak = self.self_weak.clone();
        let peer_weak = self.self_weak.clone();

        let on_fatal: Arc<dyn Fn(ClientError) + Send + Sync> = Arc::new(move |error: ClientError| {
            if let Some(client) = reader_weak.upgrade() {
                client.handle_fatal(error);
            }
        });
        let peer: Arc<dyn Fn() -> String + Send + Sync> = Arc::new(move || {
            peer_weak
                .upgrade()
                .map(|client| format!("{}:{}", client.config.host(), client.config.data_port()))
                .unwrap_or_default()
        });

        let new_reader = Reader::spawn(reader_stream, callbacks, watchdog.clone(), on_fatal, peer);

        *self.reader.lock().expect("reader lock poisoned") = Some(new_reader);
        *self.watchdog.lock().expect("watchdog lock poisoned") = watchdog;
    }

    /// Stops the reader, cancels the watchdog, and drops the data socket.
    ///
    /// Safe to call multiple times; a client with no active connection is a
    /// no-op.
    pub fn stop_comms(&self) {
        // Taken out of the `Option` and dropped here, not inside an `if let`
        // scrutinee: the guard returned by `.lock()` would otherwise live for
        // the whole `if let` block (temporary lifetime extension), holding the
        // reader lock while `Reader::drop` joins the reader thread. A thread
        // joining here while the reader thread itself calls back into
        // `stop_comms` would then deadlock on this same lock.
        let reader = self.reader.lock().expect("reader lock poisoned").take();
        drop(reader);
        self.watchdog
            .lock()
            .expect("watchdog lock poisoned")
            .cancel();
        *self.data_stream.lock().expect("data stream lock poisoned") = None;
    }

    /// Sends raw bytes to the instrument over the data socket.
    ///
    /// Returns the number of bytes actually sent; a short count means the
    /// send path gave up and already escalated the failure through
    /// [`Client::handle_fatal`].
    pub fn send(&self, data: &[u8]) -> usize {
        let mut guard = self.data_stream.lock().expect("data stream lock poisoned");
        let Some(stream) = guard.as_mut() else {
            drop(guard);
            self.handle_fatal(ClientError::ConnectionConfigError {
                message: "send called with no active connection".to_string(),
            });
            return 0;
        };

        let host = self.config.host().to_string();
        let port = self.config.data_port();
        // `send_all`'s `on_fatal` runs synchronously on this thread, while
        // `guard` is still held; it must not call `handle_fatal` directly,
        // since that re-enters `stop_comms` and deadlocks on `data_stream`.
        // Stash the error instead and escalate once `guard` is out of scope.
        let fatal = std::cell::RefCell::new(None);
        let sent = send_all(
            stream,
            data,
            || format!("{host}:{port}"),
            |error| *fatal.borrow_mut() = Some(error),
        );
        drop(guard);

        if let Some(error) = fatal.into_inner() {
            self.handle_fatal(error);
        }

        sent
    }

    /// Sends a break condition to the instrument via the ephemeral command port.
    pub fn send_break(&self) -> Result<(), ClientError> {
        self.send_command(BREAK_COMMAND)
    }

    /// Updates the heartbeat interval (seconds) and missed-beat ceiling used
    /// by future connections, and pushes the new interval to the port agent
    /// over the command port so the sender side adjusts too.
    ///
    /// `max_missed == 0` keeps the current value. Takes effect on the next
    /// successful [`Client::init_comms`] for the local watchdog; the remote
    /// port agent is told immediately.
    pub fn set_heartbeat_interval(&self, interval_secs: u32, max_missed: u32) -> Result<(), ClientError> {
        crate::watchdog::Watchdog::new(interval_secs, 1, || {})
            .map_err(|err| ClientError::ConnectionConfigError {
                message: err.to_string(),
            })?;

        {
            let mut settings = self.heartbeat.lock().expect("heartbeat lock poisoned");
            settings.interval_secs = interval_secs;
            if max_missed != 0 {
                settings.max_missed = max_missed;
            }
        }

        self.send_command(&heartbeat_interval_command(interval_secs))
    }

    fn send_command(&self, command: &str) -> Result<(), ClientError> {
        let port = self.config.require_command_port("command port operation")?;
        let host = self.config.host().to_string();

        let mut stream = TcpStream::connect((host.as_str(), port))
            .map_err(|source| ClientError::ConnectIoError { host: host.clone(), port, source })?;
        stream
            .write_all(command.as_bytes())
            .map_err(|source| ClientError::SendIoError {
                peer: format!("{host}:{port}"),
                source,
            })?;
        Ok(())
    }

    /// Called from the reader thread or the send path when a non-recoverable
    /// condition is observed.
    fn handle_fatal(&self, error: ClientError) {
        #[cfg(feature = "tracing")]
        tracing::error!(error = %error, "port agent client fatal error");
        self.handle_fatal_message(&error.callback_message());
    }

    fn handle_fatal_message(&self, message: &str) {
        self.stop_comms();
        let outcome = self.recovery.on_error(message, &self.callbacks, || {
            let _ = self.init_comms();
        });
        #[cfg(feature = "tracing")]
        tracing::warn!(?outcome, "recovery controller outcome");
        let _ = outcome;
    }

    fn handle_heartbeat_timeout(&self) {
        let max_missed = self.heartbeat.lock().expect("heartbeat lock poisoned").max_missed;
        self.handle_fatal(ClientError::HeartbeatTimeout { max_missed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_with_no_connection_reports_config_error_and_returns_zero() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors2 = Arc::clone(&errors);
        let config = Config::builder("127.0.0.1", 0).build();
        let callbacks = Callbacks::new().on_error(move |message| {
            errors2.lock().unwrap().push(message.to_string());
        });
        let client = Client::new(config, callbacks);

        let sent = client.send(b"hello");
        assert_eq!(sent, 0);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn set_heartbeat_interval_rejects_out_of_range_values() {
        let config = Config::builder("127.0.0.1", 0).command_port(1).build();
        let client = Client::new(config, Callbacks::new());
        let err = client.set_heartbeat_interval(999, 0).unwrap_err();
        assert!(matches!(err, ClientError::ConnectionConfigError { .. }));
    }

    #[test]
    fn send_break_without_command_port_is_a_config_error() {
        let config = Config::builder("127.0.0.1", 0).build();
        let client = Client::new(config, Callbacks::new());
        let err = client.send_break().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionConfigError { .. }));
    }
}

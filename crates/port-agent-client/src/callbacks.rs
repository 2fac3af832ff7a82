//! User callback plumbing.
//!
//! Callbacks are explicit, independently-optional function values rather than
//! dynamically attached attributes: a caller that only cares about decoded
//! data registers `on_data` and leaves `on_raw`/`on_error` unset. A missing
//! callback is not an error; the event is logged and dropped.

use packet::Packet;

type DataFn = dyn Fn(&Packet) + Send + Sync;
type ErrorFn = dyn Fn(&str) + Send + Sync;

/// Verifies `packet` before handing it to a registered data/raw callback.
///
/// This is the dispatch-wrapper behavior, not the callback's own
/// responsibility: a user closure only ever sees `&Packet`, but by the time
/// it runs, `packet.verify()` has already been called, so `is_valid()`
/// reflects a real checksum check rather than the pre-verification default.
fn verify(packet: &mut Packet) -> &Packet {
    packet.verify();
    packet
}

/// The three callbacks a caller may register with a [`crate::Client`].
#[derive(Default, Clone)]
pub struct Callbacks {
    on_data: Option<std::sync::Arc<DataFn>>,
    on_raw: Option<std::sync::Arc<DataFn>>,
    on_error: Option<std::sync::Arc<ErrorFn>>,
}

impl Callbacks {
    /// Returns an empty callback set; every event is logged and dropped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the callback invoked for `DATA_FROM_INSTRUMENT` packets.
    #[must_use]
    pub fn on_data(mut self, f: impl Fn(&Packet) + Send + Sync + 'static) -> Self {
        self.on_data = Some(std::sync::Arc::new(f));
        self
    }

    /// Registers the callback invoked for every packet type except `HEARTBEAT`.
    #[must_use]
    pub fn on_raw(mut self, f: impl Fn(&Packet) + Send + Sync + 'static) -> Self {
        self.on_raw = Some(std::sync::Arc::new(f));
        self
    }

    /// Registers the callback invoked when the client escalates a fatal error.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(std::sync::Arc::new(f));
        self
    }

    /// Verifies `packet`, then invokes the registered `on_data` callback, if any.
    pub(crate) fn dispatch_data(&self, packet: &mut Packet) {
        match &self.on_data {
            Some(f) => f(verify(packet)),
            None => tracing_or_eprintln("no on_data callback registered; dropping packet"),
        }
    }

    /// Verifies `packet`, then invokes the registered `on_raw` callback, if any.
    pub(crate) fn dispatch_raw(&self, packet: &mut Packet) {
        match &self.on_raw {
            Some(f) => f(verify(packet)),
            None => tracing_or_eprintln("no on_raw callback registered; dropping packet"),
        }
    }

    /// Invokes the registered `on_error` callback, if any, and reports
    /// whether one was registered (the Recovery Controller treats an absent
    /// callback differently from a registered one, see
    /// [`crate::client::Client`]).
    pub(crate) fn dispatch_error(&self, message: &str) -> bool {
        match &self.on_error {
            Some(f) => {
                f(message);
                true
            }
            None => {
                tracing_or_eprintln("no on_error callback registered");
                false
            }
        }
    }
}

fn tracing_or_eprintln(message: &str) {
    #[cfg(feature = "tracing")]
    tracing::warn!("{message}");
    #[cfg(not(feature = "tracing"))]
    eprintln!("{message}");
}

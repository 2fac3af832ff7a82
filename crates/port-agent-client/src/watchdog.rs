//! The heartbeat watchdog: a resettable one-shot timer with missed-beat hysteresis.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{HeartbeatRangeError, MAX_HEARTBEAT_INTERVAL};

/// Fudge factor added to the configured interval to absorb sender-side jitter.
const HEARTBEAT_FUDGE_SECS: u32 = 1;

/// Default missed-heartbeat ceiling when the caller doesn't specify one.
pub const DEFAULT_MAX_MISSED_HEARTBEATS: u32 = 5;

struct State {
    /// Bumped on every arm/cancel; a fired timer whose generation no longer
    /// matches the current one is stale and must not act.
    generation: u64,
    /// Countdown of consecutive misses remaining before escalation.
    missed: u32,
}

struct Inner {
    interval: Duration,
    max_missed: u32,
    state: Mutex<State>,
    on_timeout: Box<dyn Fn() + Send + Sync>,
}

/// A resettable one-shot heartbeat timer.
///
/// The underlying `std::thread`-based timer is not natively resettable, so a
/// reset is modeled as invalidating the in-flight timer (by bumping a
/// generation counter under the same lock the timer checks on expiry) and
/// spawning a fresh one. This keeps cancellation and re-arming race-free with
/// respect to a timer that is expiring concurrently (see the crate's
/// concurrency notes).
#[derive(Clone)]
pub struct Watchdog {
    inner: Option<Arc<Inner>>,
}

impl Watchdog {
    /// Builds a watchdog for the given `interval_seconds`/`max_missed`.
    ///
    /// `interval_seconds == 0` disables the watchdog entirely: every method on
    /// the returned [`Watchdog`] becomes a no-op. `on_timeout` is invoked
    /// (from the timer's own background thread) once the missed-heartbeat
    /// counter reaches zero; it is not invoked on every individual miss.
    pub fn new(
        interval_seconds: u32,
        max_missed: u32,
        on_timeout: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self, HeartbeatRangeError> {
        if interval_seconds > MAX_HEARTBEAT_INTERVAL {
            return Err(HeartbeatRangeError(interval_seconds));
        }
        if interval_seconds == 0 {
            return Ok(Self { inner: None });
        }

        let max_missed = if max_missed == 0 {
            DEFAULT_MAX_MISSED_HEARTBEATS
        } else {
            max_missed
        };

        Ok(Self {
            inner: Some(Arc::new(Inner {
                interval: Duration::from_secs(u64::from(
                    interval_seconds + HEARTBEAT_FUDGE_SECS,
                )),
                max_missed,
                state: Mutex::new(State {
                    generation: 0,
                    missed: max_missed,
                }),
                on_timeout: Box::new(on_timeout),
            })),
        })
    }

    /// Starts the timer running. Call once after construction.
    pub fn start(&self) {
        if let Some(inner) = &self.inner {
            arm(Arc::clone(inner));
        }
    }

    /// Resets the missed-heartbeat counter to `max_missed` and re-arms the
    /// timer. Call every time a `HEARTBEAT` packet is received.
    pub fn reset(&self) {
        if let Some(inner) = &self.inner {
            {
                let mut state = inner.state.lock().expect("watchdog state lock poisoned");
                state.missed = inner.max_missed;
            }
            arm(Arc::clone(inner));
        }
    }

    /// Cancels any in-flight timer without re-arming. Call on teardown.
    pub fn cancel(&self) {
        if let Some(inner) = &self.inner {
            let mut state = inner.state.lock().expect("watchdog state lock poisoned");
            state.generation = state.generation.wrapping_add(1);
        }
    }
}

fn arm(inner: Arc<Inner>) {
    let generation = {
        let mut state = inner.state.lock().expect("watchdog state lock poisoned");
        state.generation = state.generation.wrapping_add(1);
        state.generation
    };
    let expected = AtomicU64::new(generation);
    let interval = inner.interval;
    thread::spawn(move || {
        thread::sleep(interval);
        fire(&inner, expected.load(Ordering::Relaxed));
    });
}

fn fire(inner: &Arc<Inner>, expected_generation: u64) {
    let escalate = {
        let mut state = inner.state.lock().expect("watchdog state lock poisoned");
        if state.generation != expected_generation {
            return;
        }
        state.missed = state.missed.saturating_sub(1);
        state.missed == 0
    };

    if escalate {
        #[cfg(feature = "tracing")]
        tracing::error!("heartbeat watchdog exhausted missed-beat budget");
        (inner.on_timeout)();
    } else {
        #[cfg(feature = "tracing")]
        tracing::debug!("heartbeat watchdog expired, re-arming");
        arm(Arc::clone(inner));
    }
}

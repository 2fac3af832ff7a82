//! The recovery controller: a single bounded reconnect attempt.

use std::sync::Mutex;

use crate::callbacks::Callbacks;

/// Maximum number of reconnect attempts made per fatal error.
///
/// The controller does not retry in a loop: one failure buys exactly one
/// reconnect attempt, and if that attempt itself fails (recursing back into
/// this controller) the second failure always surfaces or swallows.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 1;

/// What happened in response to a fatal error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Outcome {
    /// A reconnect attempt was made; its own success or failure is reported
    /// separately (it may itself produce a further `Outcome` via recursion).
    Retried,
    /// Recovery was exhausted and the caller's `on_error` callback ran.
    Surfaced,
    /// Recovery was exhausted and no callback was registered to tell.
    Swallowed,
}

/// Tracks how many recovery attempts have been spent.
///
/// A single `RecoveryController` is shared for the entire lifetime of a
/// [`crate::Client`] and is deliberately never reset automatically: the
/// attempt budget is spent once, for the life of the client, not once per
/// incident. [`RecoveryController::reset`] exists for callers that manage
/// their own client lifecycle (e.g. a supervisor that rebuilds the `Client`
/// after a planned reconnect) and want a fresh budget on the next instance.
pub struct RecoveryController {
    attempts: Mutex<u32>,
}

impl RecoveryController {
    /// Builds a controller with a full attempt budget.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(0),
        }
    }

    /// Restores a full attempt budget. Not called by [`crate::Client`]
    /// itself; see the type-level docs.
    pub fn reset(&self) {
        *self.attempts.lock().expect("recovery mutex poisoned") = 0;
    }

    /// Handles one fatal error.
    ///
    /// `retry` re-establishes the connection (it is the caller's
    /// `init_comms`); it is invoked only after the attempt-count mutex has
    /// been released, so a failure inside `retry` is free to call back into
    /// `on_error` (and thus this same controller) without deadlocking.
    pub fn on_error(
        &self,
        message: &str,
        callbacks: &Callbacks,
        retry: impl FnOnce(),
    ) -> Outcome {
        let should_retry = {
            let mut attempts = self.attempts.lock().expect("recovery mutex poisoned");
            if *attempts >= MAX_RECOVERY_ATTEMPTS {
                false
            } else {
                *attempts += 1;
                true
            }
        };

        if should_retry {
            retry();
            Outcome::Retried
        } else if callbacks.dispatch_error(message) {
            Outcome::Surfaced
        } else {
            Outcome::Swallowed
        }
    }
}

impl Default for RecoveryController {
    fn default() -> Self {
        Self::new()
    }
}

//! Shared `tracing` subscriber setup for port agent client binaries.
//!
//! Library crates in this workspace only ever emit `tracing` events; nothing
//! below a binary decides how those events are rendered. This crate is that
//! one decision point, kept small and reused everywhere a `main` needs it.

use tracing_subscriber::EnvFilter;

/// Verbosity levels a binary's `--verbose` flag maps onto.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// Informational events plus warnings and errors.
    Normal,
    /// Debug-level events from this crate family.
    Verbose,
    /// Trace-level events from this crate family.
    Debug,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "port_agent_client=debug,packet=debug,info",
            Self::Debug => "port_agent_client=trace,packet=trace,debug",
        }
    }
}

/// Installs a `tracing-subscriber` global default writing to stderr.
///
/// `RUST_LOG` overrides `verbosity` when set, matching every other binary in
/// this workspace family. Returns an error if a global subscriber is already
/// installed; callers should only invoke this once, from `main`.
pub fn init(verbosity: Verbosity) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_are_non_empty() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Debug,
        ] {
            assert!(!verbosity.directive().is_empty());
        }
    }
}

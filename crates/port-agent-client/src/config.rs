//! Client configuration: host, ports, and the optional diagnostic delimiter.

use crate::error::ClientError;

/// Connection settings for a [`crate::Client`].
///
/// Built via [`ConfigBuilder`] so that missing-but-required fields (the host)
/// are caught at construction rather than surfacing as a runtime error deep
/// inside `init_comms`.
#[derive(Clone, Debug)]
pub struct Config {
    host: String,
    data_port: u16,
    command_port: Option<u16>,
    delimiter: Option<Vec<u8>>,
}

impl Config {
    /// Starts building a [`Config`] for `host`/`data_port`.
    #[must_use]
    pub fn builder(host: impl Into<String>, data_port: u16) -> ConfigBuilder {
        ConfigBuilder::new(host, data_port)
    }

    /// The remote host used for both the data and command ports.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The TCP port carrying the framed packet stream.
    #[must_use]
    pub const fn data_port(&self) -> u16 {
        self.data_port
    }

    /// The TCP port used for ephemeral command connections, if configured.
    #[must_use]
    pub const fn command_port(&self) -> Option<u16> {
        self.command_port
    }

    /// Returns the command port, or a [`ClientError::ConnectionConfigError`]
    /// describing which operation needed it.
    pub fn require_command_port(&self, for_operation: &str) -> Result<u16, ClientError> {
        self.command_port
            .ok_or_else(|| ClientError::ConnectionConfigError {
                message: format!(
                    "command port not configured; required for {for_operation}"
                ),
            })
    }

    /// The diagnostic line delimiter, used only by splitters when no
    /// callback is registered; the client otherwise never inspects it.
    #[must_use]
    pub fn delimiter(&self) -> Option<&[u8]> {
        self.delimiter.as_deref()
    }
}

/// Builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    host: String,
    data_port: u16,
    command_port: Option<u16>,
    delimiter: Option<Vec<u8>>,
}

impl ConfigBuilder {
    fn new(host: impl Into<String>, data_port: u16) -> Self {
        Self {
            host: host.into(),
            data_port,
            command_port: None,
            delimiter: None,
        }
    }

    /// Sets the ephemeral command port used by `send_break` and
    /// `set_heartbeat_interval`.
    #[must_use]
    pub fn command_port(mut self, port: u16) -> Self {
        self.command_port = Some(port);
        self
    }

    /// Sets the diagnostic line delimiter.
    #[must_use]
    pub fn delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Finishes the builder, producing a [`Config`].
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            data_port: self.data_port,
            command_port: self.command_port,
            delimiter: self.delimiter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_command_port_is_a_config_error() {
        let config = Config::builder("localhost", 4000).build();
        let err = config.require_command_port("send_break").unwrap_err();
        assert!(matches!(err, ClientError::ConnectionConfigError { .. }));
    }

    #[test]
    fn configured_command_port_round_trips() {
        let config = Config::builder("localhost", 4000).command_port(4001).build();
        assert_eq!(config.require_command_port("send_break").unwrap(), 4001);
    }
}

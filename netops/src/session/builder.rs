//! Builder for creating sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::Log;

use super::Session;
use crate::error::{ChannelError, Result, SessionError};
use crate::logging::SessionLog;
use crate::parser::ParserTree;
use crate::transport::{HostKeyVerification, TransportKind, TransportOptions, TransportRegistry};

/// Marker the device prints when it rejects a command. Leaving off the
/// first letter matches both `Invalid` and `invalid`.
pub const INVALID_INPUT_MARKER: &str = "nvalid input detected";

/// Latency above which a command is logged as a warning.
pub const DEFAULT_LATENCY_WARNING: Duration = Duration::from_millis(700);

/// Session-level policy, on top of the transport options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Options handed to every transport variant.
    pub transport: TransportOptions,

    /// Warn when a command takes longer than this. `None` disables the check.
    pub latency_warning: Option<Duration>,

    /// Substring that marks a command as rejected by the device.
    pub invalid_input_marker: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            latency_warning: Some(DEFAULT_LATENCY_WARNING),
            invalid_input_marker: INVALID_INPUT_MARKER.to_string(),
        }
    }
}

/// Builder for constructing sessions.
///
/// # Example
///
/// ```rust,no_run
/// use netops::{Credentials, SessionBuilder, TransportKind};
///
/// # async fn example() -> Result<(), netops::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .transports([TransportKind::Ssh, TransportKind::Telnet])
///     .timeout(std::time::Duration::from_secs(5))
///     .build()?;
///
/// session.open(Credentials::new("admin", "secret")).await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    options: SessionOptions,
    prompt: Option<String>,
    registry: TransportRegistry,
    parser: Option<Arc<ParserTree>>,
    logger: Option<Arc<dyn Log>>,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    ///
    /// For serial sessions the host is the device path.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            options: SessionOptions::default(),
            prompt: None,
            registry: TransportRegistry::default(),
            parser: None,
            logger: None,
        }
    }

    /// Replace all session options at once.
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the prompt timeout (default: 10s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.transport.timeout = timeout;
        self
    }

    /// Set the prompt pattern. It is anchored at the end of the output
    /// unless it already ends with `$`.
    pub fn prompt(mut self, pattern: impl Into<String>) -> Self {
        self.prompt = Some(pattern.into());
        self
    }

    /// Set the SSH port (default: 22).
    pub fn ssh_port(mut self, port: u16) -> Self {
        self.options.transport.ssh_port = port;
        self
    }

    /// Set the Telnet port (default: 23).
    pub fn telnet_port(mut self, port: u16) -> Self {
        self.options.transport.telnet_port = port;
        self
    }

    /// Set the serial line speed (default: 9600).
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.options.transport.serial_baud_rate = baud_rate;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.options.transport.terminal_width = width;
        self.options.transport.terminal_height = height;
        self
    }

    /// Set how many trailing bytes are searched for the prompt.
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.options.transport.search_depth = depth;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.options.transport.host_key_verification = mode;
        self
    }

    /// Set a custom known_hosts file path.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.transport.known_hosts_path = Some(path.into());
        self
    }

    /// Replace the transports to try, in order.
    pub fn transports(mut self, kinds: impl IntoIterator<Item = TransportKind>) -> Self {
        self.registry = kinds.into_iter().collect();
        self
    }

    /// Append one transport to the list.
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.registry = self.registry.register(kind);
        self
    }

    /// Set the latency warning threshold. `None` disables it.
    pub fn latency_warning(mut self, threshold: Option<Duration>) -> Self {
        self.options.latency_warning = threshold;
        self
    }

    /// Set the substring that marks a command as rejected.
    pub fn invalid_input_marker(mut self, marker: impl Into<String>) -> Self {
        self.options.invalid_input_marker = marker.into();
        self
    }

    /// Share a parser tree with the session (default: [`ParserTree::builtin`]).
    pub fn parser(mut self, parser: Arc<ParserTree>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Send session events to `logger` instead of the process-wide logger.
    pub fn logger(mut self, logger: Arc<dyn Log>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the session.
    ///
    /// This creates the session but does not connect. Call `open()` on the
    /// returned session to establish the connection.
    pub fn build(mut self) -> Result<Session> {
        let host = self.host.trim().to_string();
        if host.is_empty() {
            return Err(SessionError::InvalidConfig {
                message: "Host is required".to_string(),
            }
            .into());
        }
        if self.registry.is_empty() {
            return Err(SessionError::InvalidConfig {
                message: "At least one transport is required".to_string(),
            }
            .into());
        }
        if self.options.invalid_input_marker.is_empty() {
            return Err(SessionError::InvalidConfig {
                message: "Invalid input marker must not be empty".to_string(),
            }
            .into());
        }

        if let Some(pattern) = &self.prompt {
            self.options.transport = self
                .options
                .transport
                .with_prompt(pattern)
                .map_err(ChannelError::InvalidPattern)?;
        }

        let log = match self.logger {
            Some(sink) => SessionLog::with_sink(host.clone(), sink),
            None => SessionLog::new(host.clone()),
        };
        let parser = self
            .parser
            .unwrap_or_else(|| Arc::new(ParserTree::builtin()));

        for kind in self.registry.kinds() {
            log.debug(format_args!("Registering transport {}", kind));
        }

        Ok(Session::new(
            host,
            self.options,
            self.registry,
            parser,
            log,
        ))
    }
}

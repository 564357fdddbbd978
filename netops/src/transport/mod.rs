//! Transport layer: one trait, a closed set of variants.
//!
//! Every variant performs its own login handshake in `open` and leaves the
//! connection sitting at the device's top-level prompt. From then on the
//! session only ever asks it to send a line and wait for a pattern.

pub mod config;
mod login;
mod registry;
mod serial;
mod ssh;
mod telnet;

pub use config::{Credentials, HostKeyVerification, TransportOptions};
pub use registry::TransportRegistry;
pub use serial::SerialTransport;
pub use ssh::SshTransport;
pub use telnet::{TelnetFilter, TelnetTransport};

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use regex::bytes::Regex;
use serde::Deserialize;

use crate::error::{Result, SessionError};

/// Contract every connection mechanism satisfies.
///
/// A transport is only usable between a successful open and `close`;
/// `close` consumes it so it cannot be reused afterwards.
pub trait Transport: Send {
    /// Which variant this is.
    fn kind(&self) -> TransportKind;

    /// Send a command and wait for the device prompt.
    fn send_and_await(&mut self, command: &str) -> impl Future<Output = Result<String>> + Send;

    /// Send a command and wait for an arbitrary pattern instead of the prompt.
    fn send_and_expect(
        &mut self,
        command: &str,
        pattern: &Regex,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Send a command and wait for the first of several patterns. Returns
    /// the index of the pattern that matched along with the output.
    fn send_and_expect_any(
        &mut self,
        command: &str,
        patterns: &[&Regex],
    ) -> impl Future<Output = Result<(usize, String)>> + Send;

    /// Close the connection.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// The supported connection mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Ssh,
    Telnet,
    Serial,
}

impl TransportKind {
    /// Open a connection of this kind and log in.
    ///
    /// For [`TransportKind::Serial`] the host is the serial device path.
    pub async fn open(
        self,
        host: &str,
        options: &TransportOptions,
        credentials: &Credentials,
    ) -> Result<ActiveTransport> {
        Ok(match self {
            TransportKind::Ssh => {
                ActiveTransport::Ssh(SshTransport::open(host, options, credentials).await?)
            }
            TransportKind::Telnet => {
                ActiveTransport::Telnet(TelnetTransport::open(host, options, credentials).await?)
            }
            TransportKind::Serial => {
                ActiveTransport::Serial(SerialTransport::open(host, options, credentials).await?)
            }
        })
    }

    /// Lowercase name, as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Ssh => "ssh",
            TransportKind::Telnet => "telnet",
            TransportKind::Serial => "serial",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = SessionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(TransportKind::Ssh),
            "telnet" => Ok(TransportKind::Telnet),
            "serial" => Ok(TransportKind::Serial),
            other => Err(SessionError::InvalidConfig {
                message: format!("unknown transport '{}'", other),
            }),
        }
    }
}

/// An open connection of any supported kind.
pub enum ActiveTransport {
    Ssh(SshTransport),
    Telnet(TelnetTransport),
    Serial(SerialTransport),
}

impl Transport for ActiveTransport {
    fn kind(&self) -> TransportKind {
        match self {
            ActiveTransport::Ssh(t) => t.kind(),
            ActiveTransport::Telnet(t) => t.kind(),
            ActiveTransport::Serial(t) => t.kind(),
        }
    }

    async fn send_and_await(&mut self, command: &str) -> Result<String> {
        match self {
            ActiveTransport::Ssh(t) => t.send_and_await(command).await,
            ActiveTransport::Telnet(t) => t.send_and_await(command).await,
            ActiveTransport::Serial(t) => t.send_and_await(command).await,
        }
    }

    async fn send_and_expect(&mut self, command: &str, pattern: &Regex) -> Result<String> {
        match self {
            ActiveTransport::Ssh(t) => t.send_and_expect(command, pattern).await,
            ActiveTransport::Telnet(t) => t.send_and_expect(command, pattern).await,
            ActiveTransport::Serial(t) => t.send_and_expect(command, pattern).await,
        }
    }

    async fn send_and_expect_any(
        &mut self,
        command: &str,
        patterns: &[&Regex],
    ) -> Result<(usize, String)> {
        match self {
            ActiveTransport::Ssh(t) => t.send_and_expect_any(command, patterns).await,
            ActiveTransport::Telnet(t) => t.send_and_expect_any(command, patterns).await,
            ActiveTransport::Serial(t) => t.send_and_expect_any(command, patterns).await,
        }
    }

    async fn close(self) -> Result<()> {
        match self {
            ActiveTransport::Ssh(t) => t.close().await,
            ActiveTransport::Telnet(t) => t.close().await,
            ActiveTransport::Serial(t) => t.close().await,
        }
    }
}

impl fmt::Debug for ActiveTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveTransport").field(&self.kind()).finish()
    }
}

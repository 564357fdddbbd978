//! Error types for netops.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netops operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (connect, login, framing)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session-level errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Output parser errors
    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),
}

impl Error {
    /// True if every registered transport failed to open.
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, Error::Session(SessionError::TransportUnavailable { .. }))
    }

    /// True if the device rejected a command as invalid input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::Session(SessionError::InvalidDeviceInput { .. }))
    }

    /// True if the error came from the connection itself rather than the
    /// device's reply. A session hitting one of these must not be reused.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Transport layer errors (connection, authentication, prompt framing).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key not found in known_hosts (strict mode)
    #[error("Host key for {host}:{port} not found in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Serial port could not be opened
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (prompt patterns).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors (lifecycle, command rejection).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Every registered transport failed to connect or authenticate.
    #[error("No transport available for {host} (tried: {})", attempts.join(", "))]
    TransportUnavailable { host: String, attempts: Vec<String> },

    /// The device reported the command as invalid input.
    #[error("Invalid input detected for command '{command}'")]
    InvalidDeviceInput { command: String, output: String },

    /// Session not opened
    #[error("Session not connected - call open() first")]
    NotConnected,

    /// Session already opened
    #[error("Session already connected")]
    AlreadyConnected,

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Parser tree errors.
#[derive(Error, Debug)]
pub enum ParserError {
    /// A leaf's regex template failed to compile.
    #[error("Invalid regex template for '{command}': {source}")]
    InvalidTemplate {
        command: String,
        #[source]
        source: regex::Error,
    },

    /// The vendor root is missing from the tree source.
    #[error("Vendor '{vendor}' not found in parser tree")]
    MissingVendor { vendor: String },

    /// The tree source has an unexpected shape.
    #[error("Invalid parser tree: {message}")]
    InvalidTree { message: String },

    /// YAML source could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON source could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using netops's Error.
pub type Result<T> = std::result::Result<T, Error>;

//! Transport options and login credentials.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channel::{DEFAULT_PROMPT, compile_prompt_pattern};

static DEFAULT_PROMPT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_prompt_pattern(DEFAULT_PROMPT).expect("static regex"));

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// Options shared by every transport variant.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// How long to wait for the expected prompt before giving up.
    pub timeout: Duration,

    /// Pattern matching the device prompt, anchored at the end of output.
    pub prompt: Regex,

    /// SSH port (default: 22).
    pub ssh_port: u16,

    /// Telnet port (default: 23).
    pub telnet_port: u16,

    /// Serial line speed (default: 9600).
    pub serial_baud_rate: u32,

    /// Terminal width requested for the SSH PTY.
    pub terminal_width: u32,

    /// Terminal height requested for the SSH PTY.
    pub terminal_height: u32,

    /// Bytes from the end of the output searched for the prompt.
    pub search_depth: usize,

    /// SSH host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file (default: `~/.ssh/known_hosts`).
    pub known_hosts_path: Option<PathBuf>,
}

impl TransportOptions {
    /// Replace the prompt with a pattern string, anchoring it if needed.
    pub fn with_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.prompt = compile_prompt_pattern(pattern)?;
        Ok(self)
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            prompt: DEFAULT_PROMPT_REGEX.clone(),
            ssh_port: 22,
            telnet_port: 23,
            serial_baud_rate: 9600,
            terminal_width: 511,
            terminal_height: 24,
            search_depth: 1000,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

/// Login credentials.
///
/// The password doubles as the `enable` secret, as on most small Cisco
/// deployments.
#[derive(Deserialize)]
#[serde(from = "RawCredentials")]
pub struct Credentials {
    /// Login name.
    pub username: String,

    password: SecretString,
}

#[derive(Deserialize)]
struct RawCredentials {
    username: String,
    password: String,
}

impl From<RawCredentials> for Credentials {
    fn from(raw: RawCredentials) -> Self {
        Self::new(raw.username, raw.password)
    }
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// The password, still wrapped.
    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// The password in clear text, for writing to the device.
    pub(crate) fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self::new(self.username.clone(), self.expose_password())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

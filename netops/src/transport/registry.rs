//! Ordered list of transports tried when a session opens.

use super::config::{Credentials, TransportOptions};
use super::{ActiveTransport, TransportKind};
use crate::error::{Result, SessionError};
use crate::logging::SessionLog;

/// Transports to try, in preference order.
///
/// The default order is SSH, then Telnet. Serial is only used when
/// registered explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRegistry {
    kinds: Vec<TransportKind>,
}

impl TransportRegistry {
    /// An empty registry. Opening with it always fails.
    pub fn new() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Append a transport kind. Registering a kind twice keeps its first
    /// position.
    pub fn register(mut self, kind: TransportKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// The registered kinds in the order they are tried.
    pub fn kinds(&self) -> &[TransportKind] {
        &self.kinds
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Try each registered kind in order and return the first one that
    /// connects and logs in.
    ///
    /// Individual failures are logged at debug level and otherwise
    /// swallowed. If every kind fails that is logged as an error, and the
    /// returned error lists each attempt.
    pub async fn open(
        &self,
        host: &str,
        options: &TransportOptions,
        credentials: &Credentials,
        log: &SessionLog,
    ) -> Result<ActiveTransport> {
        let mut attempts = Vec::with_capacity(self.kinds.len());

        for kind in &self.kinds {
            log.debug(format_args!("Trying {} transport", kind));
            match kind.open(host, options, credentials).await {
                Ok(transport) => {
                    log.debug(format_args!("Connected with {} transport", kind));
                    return Ok(transport);
                }
                Err(e) => {
                    log.debug(format_args!("{} transport failed: {}", kind, e));
                    attempts.push(format!("{}: {}", kind, e));
                }
            }
        }

        log.error(format_args!("No transport available"));
        Err(SessionError::TransportUnavailable {
            host: host.to_string(),
            attempts,
        }
        .into())
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
            .register(TransportKind::Ssh)
            .register(TransportKind::Telnet)
    }
}

impl FromIterator<TransportKind> for TransportRegistry {
    fn from_iter<I: IntoIterator<Item = TransportKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::register)
    }
}

//! Session orchestration: transport fallback, mode tracking and dispatch.
//!
//! A [`Session`] owns at most one live transport. Every command goes through
//! a single dispatch path, so commands on one session run strictly in the
//! order they are issued and mode transitions interleave with them.
//!
//! # Mode transitions
//!
//! [`Session::ensure_mode`] samples the prompt with an empty command and sends
//! at most one transition (`end`, `enable`, `configure terminal`). It does not
//! check again afterwards: if the device refuses the transition, for example a
//! wrong enable secret, the session carries on in the old mode and the next
//! command runs there.

mod builder;
mod dsl;

pub use builder::{DEFAULT_LATENCY_WARNING, INVALID_INPUT_MARKER, SessionBuilder, SessionOptions};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::bytes::Regex;

use crate::channel::PASSWORD_PROMPT;
use crate::error::{Result, SessionError};
use crate::logging::SessionLog;
use crate::mode::Mode;
use crate::parser::ParserTree;
use crate::transport::{
    ActiveTransport, Credentials, Transport, TransportKind, TransportRegistry,
};

/// A CLI session with one network device.
pub struct Session {
    host: String,
    options: SessionOptions,
    registry: TransportRegistry,
    parser: Arc<ParserTree>,
    log: SessionLog,

    /// Held only while the session is open; the password doubles as the
    /// enable secret.
    credentials: Option<Credentials>,
    mode: Mode,
    transport: Option<ActiveTransport>,
}

impl Session {
    pub(crate) fn new(
        host: String,
        options: SessionOptions,
        registry: TransportRegistry,
        parser: Arc<ParserTree>,
        log: SessionLog,
    ) -> Self {
        Self {
            host,
            options,
            registry,
            parser,
            log,
            credentials: None,
            mode: Mode::Unknown,
            transport: None,
        }
    }

    /// Start building a session for `host`.
    pub fn builder(host: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(host)
    }

    /// Connect using the first registered transport that succeeds.
    ///
    /// Fails with [`SessionError::TransportUnavailable`] when every transport
    /// fails, leaving the session closed.
    pub async fn open(&mut self, credentials: Credentials) -> Result<()> {
        if self.transport.is_some() {
            return Err(SessionError::AlreadyConnected.into());
        }

        self.log.debug(format_args!(
            "Opening session as {}",
            credentials.username
        ));
        self.mode = Mode::Unknown;

        let transport = self
            .registry
            .open(&self.host, &self.options.transport, &credentials, &self.log)
            .await?;

        self.log.info(format_args!(
            "Session open over {}",
            transport.kind()
        ));
        self.transport = Some(transport);
        self.credentials = Some(credentials);
        Ok(())
    }

    /// Close the session. Closing a session that is not open does nothing.
    pub async fn close(&mut self) -> Result<()> {
        self.credentials = None;
        self.mode = Mode::Unknown;

        match self.transport.take() {
            Some(transport) => {
                self.log.debug(format_args!("Closing session"));
                transport.close().await
            }
            None => Ok(()),
        }
    }

    /// Round-trip time of a no-op command.
    pub async fn latency(&mut self) -> Result<Duration> {
        let start = Instant::now();
        self.dispatch("", None).await?;
        Ok(start.elapsed())
    }

    /// Send `command` as is and return everything the device printed, up to
    /// and including the next prompt.
    ///
    /// The current mode is not checked. Output containing the invalid-input
    /// marker fails with [`SessionError::InvalidDeviceInput`].
    pub async fn run(&mut self, command: &str) -> Result<String> {
        let mode = self.mode.clone();
        let start = Instant::now();
        let output = self.dispatch(command, None).await?;
        let elapsed = start.elapsed();

        self.log.debug(format_args!(
            "({}) Executing {} ({}ms)",
            mode,
            command,
            elapsed.as_millis()
        ));
        if self
            .options
            .latency_warning
            .is_some_and(|threshold| elapsed > threshold)
        {
            self.log.warn(format_args!(
                "High latency detected ({}ms) running {}",
                elapsed.as_millis(),
                command
            ));
        }

        if output.contains(&self.options.invalid_input_marker) {
            return Err(SessionError::InvalidDeviceInput {
                command: command.to_string(),
                output,
            }
            .into());
        }

        Ok(output)
    }

    /// Probe the device prompt with an empty command and classify it.
    pub async fn get_mode(&mut self) -> Result<Mode> {
        self.dispatch("", None).await?;
        Ok(self.mode.clone())
    }

    /// Move the device into `target` if it is not already there.
    ///
    /// Only [`Mode::User`], [`Mode::Privileged`] and [`Mode::Configuration`]
    /// can be targeted. A sub-mode already counts as configuration, so
    /// asking for configuration from `config-if` sends no transition.
    pub async fn ensure_mode(&mut self, target: Mode) -> Result<()> {
        match target {
            Mode::User => {
                if self.get_mode().await?.is_configuration_family() {
                    self.run("end").await?;
                }
            }
            Mode::Privileged => {
                if self.get_mode().await?.is_configuration_family() {
                    self.run("end").await?;
                }
                if self.get_mode().await? == Mode::User {
                    self.enable_privileged().await?;
                }
            }
            Mode::Configuration => {
                if !self.get_mode().await?.is_configuration_family() {
                    self.run("configure terminal").await?;
                }
            }
            Mode::Unknown | Mode::Named(_) => {
                return Err(SessionError::InvalidConfig {
                    message: format!("cannot enter mode '{}' directly", target),
                }
                .into());
            }
        }
        Ok(())
    }

    /// `enable`, answering the password prompt if the device shows one.
    /// Success is not verified.
    async fn enable_privileged(&mut self) -> Result<()> {
        self.log.debug(format_args!("Entering privileged mode"));

        let prompt = self.options.transport.prompt.clone();
        let (index, output) = self
            .exchange("enable", &[&*PASSWORD_PROMPT, &prompt])
            .await?;
        if index == 1 {
            // no enable secret configured
            self.mode = Mode::from_prompt(&output);
            return Ok(());
        }

        let credentials = self
            .credentials
            .clone()
            .ok_or(SessionError::NotConnected)?;
        self.dispatch(credentials.expose_password(), None).await?;
        Ok(())
    }

    /// Send `command` and wait for the prompt, or for `expect` instead.
    async fn dispatch(&mut self, command: &str, expect: Option<&Regex>) -> Result<String> {
        let (_, output) = self.exchange(command, expect.as_slice()).await?;
        Ok(output)
    }

    /// The single path every byte sent to the device goes through.
    ///
    /// With no `expect` patterns the command waits for the prompt and the
    /// mode is re-read from it. Otherwise the index of the first pattern to
    /// match is returned. A transport fault tears the session down: the
    /// transport is closed and later calls fail with
    /// [`SessionError::NotConnected`].
    async fn exchange(&mut self, command: &str, expect: &[&Regex]) -> Result<(usize, String)> {
        let transport = self.transport.as_mut().ok_or(SessionError::NotConnected)?;

        let result = match expect {
            [] => transport.send_and_await(command).await.map(|output| (0, output)),
            [pattern] => transport
                .send_and_expect(command, pattern)
                .await
                .map(|output| (0, output)),
            _ => transport.send_and_expect_any(command, expect).await,
        };

        match result {
            Ok((index, output)) => {
                if expect.is_empty() {
                    self.mode = Mode::from_prompt(&output);
                }
                Ok((index, output))
            }
            Err(e) if e.is_transport_fault() => {
                self.log.warn(format_args!("Closing session after transport fault: {}", e));
                self.mode = Mode::Unknown;
                self.credentials = None;
                if let Some(transport) = self.transport.take() {
                    if let Err(close_err) = transport.close().await {
                        self.log
                            .debug(format_args!("Close after fault failed: {}", close_err));
                    }
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// The host this session targets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Mode read from the most recent prompt. Does not touch the device.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// True between a successful `open` and `close`.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Which transport won the fallback, while open.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.transport.as_ref().map(Transport::kind)
    }

    /// Transports tried by `open`, in order.
    pub fn transports(&self) -> &[TransportKind] {
        self.registry.kinds()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The parser tree used by `get_parsed`.
    pub fn parser(&self) -> &Arc<ParserTree> {
        &self.parser
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("mode", &self.mode)
            .field("transport", &self.transport_kind())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;

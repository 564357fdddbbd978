//! Telnet transport over a plain TCP stream.
//!
//! Option negotiation is kept to the minimum a network device needs: the
//! peer may echo and suppress go-ahead, everything else is refused. The
//! remaining in-band commands are stripped before output reaches the
//! pattern buffer.

use log::debug;
use memchr::memchr2;
use regex::bytes::Regex;
use tokio::net::TcpStream;

use super::config::{Credentials, TransportOptions};
use super::login::console_login;
use super::{Transport, TransportKind};
use crate::channel::{InboundFilter, PromptStream};
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Strips Telnet commands from the inbound stream and answers negotiation.
#[derive(Debug, Clone)]
pub struct TelnetFilter {
    state: State,
    /// Options the peer has agreed to perform.
    remote: [bool; 256],
    /// Options we have agreed to perform.
    local: [bool; 256],
}

impl Default for TelnetFilter {
    fn default() -> Self {
        Self {
            state: State::Data,
            remote: [false; 256],
            local: [false; 256],
        }
    }
}

impl TelnetFilter {
    fn negotiate(&mut self, command: u8, option: u8, reply: &mut Vec<u8>) {
        let slot = option as usize;
        match command {
            WILL => {
                let accept = matches!(option, OPT_ECHO | OPT_SGA);
                if accept != self.remote[slot] || !accept {
                    self.remote[slot] = accept;
                    reply.extend_from_slice(&[IAC, if accept { DO } else { DONT }, option]);
                }
            }
            WONT => {
                if self.remote[slot] {
                    self.remote[slot] = false;
                    reply.extend_from_slice(&[IAC, DONT, option]);
                }
            }
            DO => {
                let accept = option == OPT_SGA;
                if accept != self.local[slot] || !accept {
                    self.local[slot] = accept;
                    reply.extend_from_slice(&[IAC, if accept { WILL } else { WONT }, option]);
                }
            }
            DONT => {
                if self.local[slot] {
                    self.local[slot] = false;
                    reply.extend_from_slice(&[IAC, WONT, option]);
                }
            }
            _ => {}
        }
    }
}

impl InboundFilter for TelnetFilter {
    fn filter(&mut self, input: &[u8], data: &mut Vec<u8>, reply: &mut Vec<u8>) {
        let mut i = 0;
        while i < input.len() {
            match self.state {
                State::Data => {
                    // copy everything up to the next IAC or NUL in one go
                    match memchr2(IAC, 0, &input[i..]) {
                        Some(offset) => {
                            data.extend_from_slice(&input[i..i + offset]);
                            if input[i + offset] == IAC {
                                self.state = State::Iac;
                            }
                            i += offset + 1;
                        }
                        None => {
                            data.extend_from_slice(&input[i..]);
                            i = input.len();
                        }
                    }
                }
                State::Iac => {
                    let byte = input[i];
                    i += 1;
                    self.state = match byte {
                        IAC => {
                            data.push(IAC);
                            State::Data
                        }
                        DO | DONT | WILL | WONT => State::Negotiate(byte),
                        SB => State::Sub,
                        _ => State::Data,
                    };
                }
                State::Negotiate(command) => {
                    self.negotiate(command, input[i], reply);
                    i += 1;
                    self.state = State::Data;
                }
                State::Sub => {
                    if input[i] == IAC {
                        self.state = State::SubIac;
                    }
                    i += 1;
                }
                State::SubIac => {
                    self.state = if input[i] == SE {
                        State::Data
                    } else {
                        State::Sub
                    };
                    i += 1;
                }
            }
        }
    }
}

/// Telnet connection to a device.
#[derive(Debug)]
pub struct TelnetTransport {
    stream: PromptStream<TcpStream, TelnetFilter>,
}

impl TelnetTransport {
    /// Connect to `host` on the configured Telnet port and log in.
    pub async fn open(
        host: &str,
        options: &TransportOptions,
        credentials: &Credentials,
    ) -> Result<Self> {
        let port = options.telnet_port;

        let tcp = tokio::time::timeout(options.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Timeout(options.timeout))?
            .map_err(|source| TransportError::ConnectionFailed {
                host: host.to_string(),
                port,
                source,
            })?;
        tcp.set_nodelay(true).map_err(TransportError::Io)?;
        debug!("telnet: connected to {}:{}", host, port);

        let mut stream = PromptStream::with_filter(
            tcp,
            TelnetFilter::default(),
            options.prompt.clone(),
            options.timeout,
            options.search_depth,
        )
        .with_line_ending("\r\n");

        console_login(&mut stream, credentials).await?;
        debug!("telnet: logged in to {} as {}", host, credentials.username);

        Ok(Self { stream })
    }
}

impl Transport for TelnetTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Telnet
    }

    async fn send_and_await(&mut self, command: &str) -> Result<String> {
        self.stream.send_and_await(command).await
    }

    async fn send_and_expect(&mut self, command: &str, pattern: &Regex) -> Result<String> {
        self.stream.send_and_expect(command, pattern).await
    }

    async fn send_and_expect_any(
        &mut self,
        command: &str,
        patterns: &[&Regex],
    ) -> Result<(usize, String)> {
        self.stream.send_and_expect_any(command, patterns).await
    }

    async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await
    }
}

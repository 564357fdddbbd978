//! SSH transport: password login and an interactive shell over russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use regex::bytes::Regex;
use russh::ChannelStream;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;

use super::config::{Credentials, HostKeyVerification, TransportOptions};
use super::{Transport, TransportKind};
use crate::channel::PromptStream;
use crate::error::{Result, TransportError};

/// SSH connection to a device, with an interactive shell on a PTY.
pub struct SshTransport {
    session: Handle<SshHandler>,

    /// Shell channel, framed by prompt.
    stream: PromptStream<ChannelStream<Msg>>,
}

impl SshTransport {
    /// Connect, authenticate with the password and wait for the first prompt.
    pub async fn open(
        host: &str,
        options: &TransportOptions,
        credentials: &Credentials,
    ) -> Result<Self> {
        let port = options.ssh_port;
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(options.timeout * 6),
            ..client::Config::default()
        });

        let refusal = Arc::new(Mutex::new(None));
        let handler = SshHandler {
            host: host.to_string(),
            port,
            policy: options.host_key_verification.clone(),
            known_hosts: options.known_hosts_path.clone(),
            refusal: refusal.clone(),
        };

        let mut session = tokio::time::timeout(
            options.timeout,
            client::connect(config, (host, port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(options.timeout))?
        .map_err(|e| {
            let refused = refusal.lock().ok().and_then(|mut slot| slot.take());
            match (refused, e) {
                (Some(why), _) => why,
                (None, russh::Error::IO(source)) => TransportError::ConnectionFailed {
                    host: host.to_string(),
                    port,
                    source,
                },
                (None, e) => TransportError::Ssh(e),
            }
        })?;
        debug!("ssh: connected to {}:{}", host, port);

        let authenticated = session
            .authenticate_password(&credentials.username, credentials.expose_password())
            .await
            .map_err(TransportError::Ssh)?
            .success();
        if !authenticated {
            return Err(TransportError::AuthenticationFailed {
                user: credentials.username.clone(),
            }
            .into());
        }

        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;
        channel
            .request_pty(
                true,
                "vt100",
                options.terminal_width,
                options.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;
        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        let mut stream = PromptStream::new(
            channel.into_stream(),
            options.prompt.clone(),
            options.timeout,
            options.search_depth,
        );

        let prompt = options.prompt.clone();
        stream.read_until(&prompt).await?;
        debug!("ssh: shell ready on {} as {}", host, credentials.username);

        Ok(Self { session, stream })
    }
}

impl Transport for SshTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ssh
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
        // the shell may already be gone; the disconnect below is what matters
        if let Err(e) = self.stream.shutdown().await {
            debug!("ssh: channel shutdown failed: {}", e);
        }
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// Host key policy for one connection attempt.
struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyVerification,
    known_hosts: Option<PathBuf>,
    /// Why the key was refused, since russh only reports `UnknownKey`.
    refusal: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// `Ok(false)` means the host has no entry yet.
    fn lookup(&self, key: &PublicKey) -> std::result::Result<bool, TransportError> {
        let found = match &self.known_hosts {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        found.map_err(|e| match e {
            russh::keys::Error::KeyChanged { line } => TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            },
            other => TransportError::KnownHosts(other.to_string()),
        })
    }

    fn remember(&self, key: &PublicKey) {
        let saved = match &self.known_hosts {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = saved {
            warn!("ssh: could not record host key for {}: {}", self.host, e);
        }
    }

    fn verify(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        match (&self.policy, self.lookup(key)?) {
            (_, true) => Ok(()),
            (HostKeyVerification::AcceptNew, false) => {
                self.remember(key);
                Ok(())
            }
            (_, false) => Err(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            }),
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        if self.policy == HostKeyVerification::Disabled {
            return Ok(true);
        }
        match self.verify(server_public_key) {
            Ok(()) => Ok(true),
            Err(e) => {
                if let Ok(mut slot) = self.refusal.lock() {
                    *slot = Some(e);
                }
                Ok(false)
            }
        }
    }
}

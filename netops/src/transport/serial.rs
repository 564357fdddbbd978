//! Serial console transport.
//!
//! The session "host" is the serial device path (e.g. `/dev/ttyUSB0`). The
//! line is opened 8N1 at the configured speed. A console does not speak
//! first, so an empty line is sent to wake it before logging in.

use log::debug;
use regex::bytes::Regex;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use super::config::{Credentials, TransportOptions};
use super::login::console_login;
use super::{Transport, TransportKind};
use crate::channel::PromptStream;
use crate::error::{Result, TransportError};

/// Serial console connection to a device.
pub struct SerialTransport {
    stream: PromptStream<SerialStream>,
}

impl SerialTransport {
    /// Open the serial device at `path` and log in.
    pub async fn open(
        path: &str,
        options: &TransportOptions,
        credentials: &Credentials,
    ) -> Result<Self> {
        let port = tokio_serial::new(path, options.serial_baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| TransportError::Serial(format!("{}: {}", path, e)))?;
        debug!(
            "serial: opened {} at {} baud",
            path, options.serial_baud_rate
        );

        let mut stream = PromptStream::new(
            port,
            options.prompt.clone(),
            options.timeout,
            options.search_depth,
        );

        stream.send("").await?;
        console_login(&mut stream, credentials).await?;
        debug!("serial: console ready on {}", path);

        Ok(Self { stream })
    }
}

impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
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

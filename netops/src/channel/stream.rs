//! Prompt-framed command/response over a byte stream.
//!
//! `PromptStream` is the part every line-oriented transport has in common:
//! write a line, then accumulate output until a pattern shows up at the tail
//! of the buffer or the timeout fires.

use std::time::Duration;

use bytes::BytesMut;
use log::trace;
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::buffer::PatternBuffer;
use crate::error::{Result, TransportError};

/// Transforms raw inbound bytes before they reach the pattern buffer.
///
/// Protocols with in-band signalling (Telnet) strip it here and may queue a
/// reply that is written back to the peer.
pub trait InboundFilter: Send {
    /// Filter `input`, appending visible data to `data` and any protocol
    /// reply to `reply`.
    fn filter(&mut self, input: &[u8], data: &mut Vec<u8>, reply: &mut Vec<u8>);
}

/// Passes every byte through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Raw;

impl InboundFilter for Raw {
    fn filter(&mut self, input: &[u8], data: &mut Vec<u8>, _reply: &mut Vec<u8>) {
        data.extend_from_slice(input);
    }
}

/// Line-oriented stream with prompt detection.
#[derive(Debug)]
pub struct PromptStream<S, F = Raw> {
    io: S,
    filter: F,
    buffer: PatternBuffer,
    prompt: Regex,
    timeout: Duration,
    line_ending: &'static str,
    read_buf: BytesMut,
}

impl<S> PromptStream<S, Raw>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a stream that passes input through unfiltered.
    pub fn new(io: S, prompt: Regex, timeout: Duration, search_depth: usize) -> Self {
        Self::with_filter(io, Raw, prompt, timeout, search_depth)
    }
}

impl<S, F> PromptStream<S, F>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    F: InboundFilter,
{
    /// Create a stream with an inbound filter.
    pub fn with_filter(
        io: S,
        filter: F,
        prompt: Regex,
        timeout: Duration,
        search_depth: usize,
    ) -> Self {
        Self {
            io,
            filter,
            buffer: PatternBuffer::new(search_depth),
            prompt,
            timeout,
            line_ending: "\n",
            read_buf: BytesMut::with_capacity(4096),
        }
    }

    /// Set the line terminator appended by [`send`](Self::send).
    pub fn with_line_ending(mut self, line_ending: &'static str) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// The prompt pattern this stream waits for.
    pub fn prompt(&self) -> &Regex {
        &self.prompt
    }

    /// The per-read timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write one line to the peer.
    pub async fn send(&mut self, input: &str) -> Result<()> {
        let mut line = Vec::with_capacity(input.len() + self.line_ending.len());
        line.extend_from_slice(input.as_bytes());
        line.extend_from_slice(self.line_ending.as_bytes());
        self.io.write_all(&line).await.map_err(TransportError::Io)?;
        self.io.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    /// Read until `pattern` matches the tail of the accumulated output.
    ///
    /// Returns everything read up to and including the match. Fails with
    /// [`TransportError::Timeout`] if the pattern does not show up in time.
    pub async fn read_until(&mut self, pattern: &Regex) -> Result<String> {
        let (_, output) = self.read_until_any(&[pattern]).await?;
        Ok(output)
    }

    /// Read until any of `patterns` matches the tail of the output.
    ///
    /// Patterns are tried in order, so the index of the first one that
    /// matches is returned along with the output.
    pub async fn read_until_any(&mut self, patterns: &[&Regex]) -> Result<(usize, String)> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.read_until_inner(patterns)).await {
            Ok(result) => result,
            Err(_) => {
                trace!(
                    "timed out waiting for {:?}, buffer: {:?}",
                    patterns.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
                    self.buffer.as_str_lossy()
                );
                Err(TransportError::Timeout(timeout).into())
            }
        }
    }

    async fn read_until_inner(&mut self, patterns: &[&Regex]) -> Result<(usize, String)> {
        let mut data = Vec::new();
        let mut reply = Vec::new();

        loop {
            if let Some(index) = patterns.iter().position(|p| self.buffer.tail_contains(p)) {
                let output = self.buffer.take();
                return Ok((index, String::from_utf8_lossy(&output).into_owned()));
            }

            self.read_buf.clear();
            let n = self
                .io
                .read_buf(&mut self.read_buf)
                .await
                .map_err(TransportError::Io)?;
            if n == 0 {
                return Err(TransportError::Disconnected.into());
            }

            data.clear();
            reply.clear();
            self.filter.filter(&self.read_buf, &mut data, &mut reply);

            if !reply.is_empty() {
                self.io.write_all(&reply).await.map_err(TransportError::Io)?;
                self.io.flush().await.map_err(TransportError::Io)?;
            }

            self.buffer.extend(&data);
        }
    }

    /// Send a command and wait for the prompt.
    pub async fn send_and_await(&mut self, command: &str) -> Result<String> {
        self.send(command).await?;
        let prompt = self.prompt.clone();
        self.read_until(&prompt).await
    }

    /// Send a command and wait for an arbitrary pattern.
    pub async fn send_and_expect(&mut self, command: &str, pattern: &Regex) -> Result<String> {
        self.send(command).await?;
        self.read_until(pattern).await
    }

    /// Send a command and wait for whichever of `patterns` shows up first.
    pub async fn send_and_expect_any(
        &mut self,
        command: &str,
        patterns: &[&Regex],
    ) -> Result<(usize, String)> {
        self.send(command).await?;
        self.read_until_any(patterns).await
    }

    /// Shut down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await.map_err(TransportError::Io)?;
        Ok(())
    }
}

//! Connection handling
//!
//! Wraps an established stream so callers exchange `Message`s instead of
//! bytes, with receive limits and traffic statistics attached. One reader
//! and one writer at a time; share across threads only behind a lock.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use super::frame::{recv_message_with, send_message};
use super::{TransportConfig, TransportResult};
use crate::protocol::Message;

/// Connection statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Messages sent
    pub messages_sent: u64,
    /// Messages received
    pub messages_received: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
}

/// A message-level view of a byte stream
pub struct Connection<S> {
    stream: S,
    config: TransportConfig,
    stats: ConnectionStats,
    last_activity: Instant,
}

impl<S: Read + Write> Connection<S> {
    /// Wrap an already-established stream
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, TransportConfig::default())
    }

    pub fn with_config(stream: S, config: TransportConfig) -> Self {
        Self {
            stream,
            config,
            stats: ConnectionStats::default(),
            last_activity: Instant::now(),
        }
    }

    /// Send a message
    pub fn send(&mut self, message: &Message) -> TransportResult<()> {
        let written = send_message(&mut self.stream, message)?;

        self.stats.messages_sent += 1;
        self.stats.bytes_sent += written as u64;
        self.last_activity = Instant::now();

        tracing::debug!("Sent message with {} fields ({} bytes)", message.len(), written);
        Ok(())
    }

    /// Receive a message, blocking until a whole frame has arrived
    pub fn recv(&mut self) -> TransportResult<Message> {
        let (message, read) = recv_message_with(&mut self.stream, &self.config)?;

        self.stats.messages_received += 1;
        self.stats.bytes_received += read as u64;
        self.last_activity = Instant::now();

        tracing::debug!("Received message with {} fields ({} bytes)", message.len(), read);
        Ok(message)
    }

    /// Send a message and wait for the peer's reply
    pub fn request(&mut self, message: &Message) -> TransportResult<Message> {
        self.send(message)?;
        self.recv()
    }
}

impl<S> Connection<S> {
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Get connection statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Get time since last activity
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}

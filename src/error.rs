// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `telelink` library.
//!
//! This module provides the error hierarchy used across the library:
//! transport failures, wire protocol violations, producer read failures,
//! and the fatal session-exhaustion condition.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred on the transport (connect, send, receive, close).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error occurred while encoding or decoding a wire message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred inside a sensor producer.
    #[error("producer error: {0}")]
    Producer(#[from] ProducerError),

    /// All session-level retries were exhausted.
    ///
    /// This is the only non-recoverable error: the hosting process is
    /// expected to stop (with a non-zero exit) when it observes it.
    #[error("session failed after {attempts} attempts")]
    SessionExhausted {
        /// Total number of session attempts made (initial + retries).
        attempts: u32,
    },
}

impl Error {
    /// Returns true if this error terminates the owning process.
    ///
    /// Transport and protocol errors are retried or skipped locally;
    /// only session exhaustion is fatal.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionExhausted { .. })
    }
}

/// Errors on the WebSocket transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing the connection failed.
    #[error("connection failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    Receive(#[source] tokio_tungstenite::tungstenite::Error),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// Binding or accepting on the hub listener failed.
    #[error("listener error: {0}")]
    Listener(#[from] std::io::Error),

    /// An internal queue was closed while the transport still needed it.
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),
}

/// Errors decoding or encoding wire messages.
///
/// Protocol errors are recovered locally: a malformed incoming message is
/// dropped with a logged warning and the connection stays up.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The message is structurally valid JSON but not a known message.
    #[error("unexpected message format: {0}")]
    UnexpectedFormat(String),
}

/// Errors inside a single sensor producer.
///
/// Producer errors are isolated: a failed read is logged and the producer
/// keeps waiting for the next trigger. Siblings and the dispatcher are
/// never affected.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Reading from the underlying source failed.
    #[error("sensor read failed: {0}")]
    ReadFailed(String),

    /// The source hardware is not available.
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_exhausted_is_fatal() {
        let err = Error::SessionExhausted { attempts: 6 };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "session failed after 6 attempts");
    }

    #[test]
    fn transport_error_is_recoverable() {
        let err: Error = TransportError::Closed.into();
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "transport error: connection closed by peer");
    }

    #[test]
    fn producer_error_display() {
        let err = ProducerError::ReadFailed("bus timeout".to_string());
        assert_eq!(err.to_string(), "sensor read failed: bus timeout");
    }

    #[test]
    fn error_from_protocol_error() {
        let proto = ProtocolError::UnexpectedFormat("missing type".to_string());
        let err: Error = proto.into();
        assert!(matches!(err, Error::Protocol(_)));
    }
}

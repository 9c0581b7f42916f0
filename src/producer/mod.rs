// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event-triggered sensor producers.
//!
//! A [`SensorProducer`] owns one [`EventLatch`], the command name it
//! responds to, and a pluggable [`ReadingSource`]. Commands arm the latch;
//! the producer loop drains it and emits exactly one reading per
//! arm-then-clear cycle. Producers never touch the transport — they only
//! push onto the outbound queue.
//!
//! # Examples
//!
//! ```
//! use telelink::message::CMD_MEASURE_TEMPERATURE;
//! use telelink::producer::{SensorProducer, TemperatureSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let producer = SensorProducer::new(
//!     TemperatureSource::default(),
//!     CMD_MEASURE_TEMPERATURE,
//!     "living_room",
//! );
//!
//! producer.handle_command(CMD_MEASURE_TEMPERATURE);
//! let reading = producer.next_reading().await.unwrap();
//! assert_eq!(reading.kind(), "sensor_data");
//! # }
//! ```

mod sources;

pub use sources::{CameraSource, TemperatureSource};

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::sync::mpsc;

use crate::error::ProducerError;
use crate::latch::EventLatch;
use crate::message::{Message, ReadingMap};

/// One reading obtained from a source, before tagging and serialization.
#[derive(Debug, Clone)]
pub enum Reading {
    /// Numeric/text telemetry fields (becomes a `sensor_data` message).
    Telemetry(ReadingMap),
    /// Capture fields (becomes a `picture` message).
    Picture(ReadingMap),
}

/// A pluggable reading source: real hardware or a simulated stand-in.
///
/// Implementations must be cheap to call repeatedly; a failed read is
/// isolated by the producer loop and never stops it.
pub trait ReadingSource: Send + Sync {
    /// The sensor name stamped on every emitted message.
    fn sensor(&self) -> &str;

    /// Obtains one reading.
    ///
    /// # Errors
    ///
    /// Returns `ProducerError` if the underlying source fails.
    fn read(&self) -> Result<Reading, ProducerError>;
}

/// An event-triggered telemetry producer.
///
/// The producer↔command association is 1:1 and immutable after
/// construction. An optional interval turns the producer into a
/// time-driven variant that also fires without a command.
pub struct SensorProducer {
    source: Box<dyn ReadingSource>,
    command: String,
    location: String,
    interval: Option<Duration>,
    latch: EventLatch,
}

impl SensorProducer {
    /// Creates a producer that emits one reading per matching command.
    #[must_use]
    pub fn new(
        source: impl ReadingSource + 'static,
        command: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            source: Box::new(source),
            command: command.into(),
            location: location.into(),
            interval: None,
            latch: EventLatch::new(),
        }
    }

    /// Also emits a reading every `interval`, without waiting for a command.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// The command name this producer responds to.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The sensor name of the underlying source.
    #[must_use]
    pub fn sensor(&self) -> &str {
        self.source.sensor()
    }

    /// Arms the latch if the command matches this producer; otherwise no-op.
    ///
    /// A pure predicate: it cannot fail, and repeated matches before the
    /// next drain coalesce into a single emitted reading.
    pub fn handle_command(&self, command: &str) {
        if command == self.command {
            tracing::debug!(sensor = self.sensor(), command, "trigger armed");
            self.latch.arm();
        }
    }

    /// Suspends until the next trigger (latch, or interval if configured).
    async fn triggered(&self) {
        match self.interval {
            Some(period) => {
                tokio::select! {
                    () = self.latch.wait() => {}
                    () = tokio::time::sleep(period) => {
                        tracing::debug!(sensor = self.sensor(), "interval trigger fired");
                    }
                }
            }
            None => self.latch.wait().await,
        }
    }

    /// Waits for the next trigger and produces one tagged reading.
    ///
    /// Calling this repeatedly yields the producer's lazy, infinite,
    /// restartable sequence of messages.
    ///
    /// # Errors
    ///
    /// Returns `ProducerError` if the source read fails. The trigger is
    /// already consumed; the caller decides whether to keep looping.
    pub async fn next_reading(&self) -> Result<Message, ProducerError> {
        self.triggered().await;

        let time = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        let message = match self.source.read()? {
            Reading::Telemetry(data) => Message::SensorData {
                sensor: self.sensor().to_string(),
                location: self.location.clone(),
                time,
                data,
            },
            Reading::Picture(data) => Message::Picture {
                sensor: self.sensor().to_string(),
                location: self.location.clone(),
                time,
                data,
            },
        };
        tracing::debug!(sensor = self.sensor(), kind = message.kind(), "reading produced");
        Ok(message)
    }

    /// Drains triggers forever, pushing readings onto the outbound queue.
    ///
    /// Read failures are logged and skipped; the loop only ends when the
    /// outbound queue is closed (external cancellation).
    pub async fn run(&self, outbound: &mpsc::UnboundedSender<Message>) {
        loop {
            match self.next_reading().await {
                Ok(message) => {
                    if outbound.send(message).is_err() {
                        tracing::info!(sensor = self.sensor(), "outbound queue closed, stopping");
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!(sensor = self.sensor(), error = %err, "reading failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for SensorProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorProducer")
            .field("sensor", &self.sensor())
            .field("command", &self.command)
            .field("location", &self.location)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

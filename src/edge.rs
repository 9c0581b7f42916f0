// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge device assembly.
//!
//! An [`EdgeDevice`] wires the pieces together: one command queue from
//! the connection manager to the dispatcher, one outbound queue from the
//! producers to the connection manager, one task per producer, and the
//! supervised connection itself.
//!
//! ```text
//! hub ─► transport ─► inbound pump ─► command queue ─► dispatcher
//!                                                        │ fan-out
//!                                                  producer latches
//!                                                        │
//! hub ◄─ transport ◄─ outbound pump ◄─ outbound queue ◄─ producer loops
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use telelink::config::EdgeConfig;
//! use telelink::edge::EdgeDevice;
//! use telelink::message::{CMD_MEASURE_TEMPERATURE, CMD_TAKE_PICTURE};
//! use telelink::producer::{CameraSource, SensorProducer, TemperatureSource};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = EdgeConfig::new("ws://hub.local:8765", "living_room");
//! let location = config.location.clone();
//!
//! let device = EdgeDevice::new(config)
//!     .with_producer(SensorProducer::new(
//!         TemperatureSource::default(),
//!         CMD_MEASURE_TEMPERATURE,
//!         location.clone(),
//!     ))
//!     .with_producer(SensorProducer::new(
//!         CameraSource::default(),
//!         CMD_TAKE_PICTURE,
//!         location,
//!     ));
//!
//! // Runs until session retries are exhausted; the host should exit
//! // non-zero on error.
//! if let Err(err) = device.run().await {
//!     eprintln!("edge device failed: {err}");
//!     std::process::exit(1);
//! }
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_tungstenite::Connector;

use crate::config::EdgeConfig;
use crate::connection::{ConnectionConfig, ConnectionManager};
use crate::dispatch::CommandDispatcher;
use crate::error::Error;
use crate::producer::SensorProducer;

/// A runnable edge device: producers, dispatcher and supervised connection.
pub struct EdgeDevice {
    config: EdgeConfig,
    tls: Option<Connector>,
    producers: Vec<Arc<SensorProducer>>,
}

impl EdgeDevice {
    /// Creates a device with no producers registered.
    #[must_use]
    pub fn new(config: EdgeConfig) -> Self {
        Self {
            config,
            tls: None,
            producers: Vec::new(),
        }
    }

    /// Supplies the TLS connector built by the host from the configured
    /// certificate directory.
    #[must_use]
    pub fn with_tls_connector(mut self, connector: Connector) -> Self {
        self.tls = Some(connector);
        self
    }

    /// Registers a producer.
    #[must_use]
    pub fn with_producer(mut self, producer: SensorProducer) -> Self {
        self.producers.push(Arc::new(producer));
        self
    }

    /// Returns the number of registered producers.
    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    fn connection_config(&self) -> ConnectionConfig {
        let mut connection = ConnectionConfig::new(self.config.uri.clone())
            .with_session_retry(self.config.session_retry)
            .with_connect_retry(self.config.connect_retry)
            .with_resend_delay(self.config.resend_delay)
            .with_shutdown_grace(self.config.shutdown_grace);
        if let Some(connector) = &self.tls {
            connection = connection.with_tls_connector(connector.clone());
        }
        connection
    }

    /// Runs the device until clean disconnect or fatal session failure.
    ///
    /// All producer tasks and the dispatcher are stopped when the
    /// connection manager returns, on both the clean and the fatal path.
    ///
    /// # Errors
    ///
    /// Returns `Error::SessionExhausted` when the connection manager gives
    /// up; the hosting process must treat this as a stop condition.
    pub async fn run(self) -> Result<(), Error> {
        tracing::info!(
            uri = %self.config.uri,
            location = %self.config.location,
            producers = self.producers.len(),
            tls = self.config.use_tls,
            "edge device starting"
        );
        if self.config.use_tls && self.tls.is_none() {
            tracing::warn!("TLS is enabled but no connector was supplied, connecting in the clear");
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let mut dispatcher = CommandDispatcher::new();
        for producer in &self.producers {
            dispatcher.register(Arc::clone(producer));
        }

        let mut tasks = Vec::with_capacity(self.producers.len() + 1);
        for producer in &self.producers {
            let producer = Arc::clone(producer);
            let outbound = outbound_tx.clone();
            tasks.push(tokio::spawn(async move {
                producer.run(&outbound).await;
            }));
        }
        tasks.push(tokio::spawn(async move {
            dispatcher.run(command_rx).await;
        }));
        // The manager's receiver is the only remaining consumer side.
        drop(outbound_tx);

        let manager = ConnectionManager::new(self.connection_config());
        let result = manager.run(command_tx, outbound_rx).await;

        // A fatal session failure stops the whole device, not just the pumps.
        for task in &tasks {
            task.abort();
        }

        match &result {
            Ok(()) => tracing::info!("edge device stopped"),
            Err(err) => tracing::error!(error = %err, "edge device failed"),
        }
        result
    }
}

impl std::fmt::Debug for EdgeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeDevice")
            .field("uri", &self.config.uri)
            .field("location", &self.config.location)
            .field("producers", &self.producers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RetryPolicy;
    use crate::message::CMD_MEASURE_TEMPERATURE;
    use crate::producer::TemperatureSource;

    #[test]
    fn builder_registers_producers() {
        let config = EdgeConfig::new("ws://hub:8765", "attic");
        let device = EdgeDevice::new(config).with_producer(SensorProducer::new(
            TemperatureSource::default(),
            CMD_MEASURE_TEMPERATURE,
            "attic",
        ));

        assert_eq!(device.producer_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_hub_is_fatal_after_retries() {
        let config = EdgeConfig::new("ws://127.0.0.1:1", "attic")
            .with_session_retry(RetryPolicy::new(0, 0.0))
            .with_connect_retry(RetryPolicy::new(0, 0.0));
        let device = EdgeDevice::new(config).with_producer(SensorProducer::new(
            TemperatureSource::default(),
            CMD_MEASURE_TEMPERATURE,
            "attic",
        ));

        let result = device.run().await;
        match result {
            Err(Error::SessionExhausted { attempts }) => assert_eq!(attempts, 1),
            other => panic!("expected SessionExhausted, got {other:?}"),
        }
    }
}

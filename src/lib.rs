// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `telelink` - telemetry and command relay between a hub and edge devices.
//!
//! This library connects a central broadcast hub with remote edge devices
//! over persistent WebSocket connections. Unreliable network I/O is
//! decoupled from local data production and consumption via queues, and
//! connection loss is tolerated through automatic reconnection with
//! bounded exponential backoff.
//!
//! # Architecture
//!
//! - **Hub side**: a [`hub::BroadcastHub`] relays every message it
//!   receives from one peer to all other connected peers, pruning peers
//!   that disconnect mid-broadcast.
//! - **Edge side**: an [`edge::EdgeDevice`] runs event-triggered sensor
//!   producers behind a [`connection::ConnectionManager`] that keeps the
//!   session alive across transport failures. Commands arriving from the
//!   hub arm producer latches; each armed latch yields exactly one
//!   reading, pushed back to the hub.
//!
//! # Quick Start
//!
//! ## Running a hub
//!
//! ```no_run
//! use std::sync::Arc;
//! use telelink::hub::{self, BroadcastHub};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> telelink::Result<()> {
//!     let hub = Arc::new(BroadcastHub::new());
//!     let listener = TcpListener::bind("0.0.0.0:8765").await
//!         .map_err(telelink::TransportError::Listener)?;
//!     hub::serve(listener, hub).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Running an edge device
//!
//! ```no_run
//! use telelink::config::EdgeConfig;
//! use telelink::edge::EdgeDevice;
//! use telelink::message::CMD_MEASURE_TEMPERATURE;
//! use telelink::producer::{SensorProducer, TemperatureSource};
//!
//! #[tokio::main]
//! async fn main() -> telelink::Result<()> {
//!     let config = EdgeConfig::new("ws://hub.local:8765", "living_room");
//!
//!     EdgeDevice::new(config)
//!         .with_producer(SensorProducer::new(
//!             TemperatureSource::default(),
//!             CMD_MEASURE_TEMPERATURE,
//!             "living_room",
//!         ))
//!         .run()
//!         .await
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod edge;
pub mod error;
pub mod hub;
pub mod latch;
pub mod message;
pub mod producer;

pub use config::EdgeConfig;
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, RetryPolicy};
pub use dispatch::CommandDispatcher;
pub use edge::EdgeDevice;
pub use error::{Error, ProducerError, ProtocolError, Result, TransportError};
pub use hub::{BroadcastHub, PeerId};
pub use latch::EventLatch;
pub use message::{FieldValue, Message, ReadingMap};
pub use producer::{CameraSource, Reading, ReadingSource, SensorProducer, TemperatureSource};

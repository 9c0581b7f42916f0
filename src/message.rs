// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire message types exchanged between the hub and edge devices.
//!
//! Every message is a single newline-free UTF-8 JSON record tagged by its
//! `type` field, so additional fields never break older consumers:
//!
//! - `command`: `{"type":"command","command":"measure_temperature"}`
//! - `sensor_data`: `{"type":"sensor_data","sensor":"BME280","location":"living_room","data":{"temperature":25.2,"humidity":48.1}}`
//! - `picture`: `{"type":"picture","sensor":"camera","location":"hallway","data":{"picture":"picture.jpg"}}`
//!
//! # Examples
//!
//! ```
//! use telelink::message::Message;
//!
//! let msg = Message::command("take_picture");
//! let text = msg.encode().unwrap();
//! assert_eq!(Message::decode(&text).unwrap(), msg);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Command name requesting a camera capture.
pub const CMD_TAKE_PICTURE: &str = "take_picture";

/// Command name requesting a temperature measurement.
pub const CMD_MEASURE_TEMPERATURE: &str = "measure_temperature";

/// A single field in a telemetry `data` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A numeric reading (temperature, humidity, ...).
    Number(f64),
    /// A text value (picture path, status string, ...).
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Field name → value mapping carried by telemetry messages.
///
/// A `BTreeMap` keeps the encoded field order stable.
pub type ReadingMap = BTreeMap<String, FieldValue>;

/// A message on the wire, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A command addressed to edge producers.
    ///
    /// The command namespace is open; producers silently ignore names
    /// they do not match.
    Command {
        /// The command name (e.g. `take_picture`).
        command: String,
    },

    /// A sensor reading produced by an edge device.
    SensorData {
        /// The sensor name (e.g. `BME280`).
        sensor: String,
        /// The configured location label of the device.
        location: String,
        /// RFC 3339 timestamp of the reading, when available.
        #[serde(skip_serializing_if = "Option::is_none")]
        time: Option<String>,
        /// The reading fields.
        data: ReadingMap,
    },

    /// A picture capture notification produced by an edge device.
    Picture {
        /// The sensor name (always `camera` for the built-in source).
        sensor: String,
        /// The configured location label of the device.
        location: String,
        /// RFC 3339 timestamp of the capture, when available.
        #[serde(skip_serializing_if = "Option::is_none")]
        time: Option<String>,
        /// The capture fields (`picture` → path/identifier).
        data: ReadingMap,
    },
}

impl Message {
    /// Creates a command message.
    #[must_use]
    pub fn command(name: impl Into<String>) -> Self {
        Self::Command {
            command: name.into(),
        }
    }

    /// Returns the `type` tag of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::SensorData { .. } => "sensor_data",
            Self::Picture { .. } => "picture",
        }
    }

    /// Returns the command name if this is a command message.
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        match self {
            Self::Command { command } => Some(command),
            _ => None,
        }
    }

    /// Encodes the message as a single newline-free JSON record.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Json` if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a message from its wire representation.
    ///
    /// Unknown extra fields are ignored; an unknown or missing `type` tag
    /// is an error.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Json` for malformed JSON or an unrecognized
    /// message shape.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

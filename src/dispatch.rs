// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command dispatch fan-out.
//!
//! The dispatcher performs no filtering of its own: every command is
//! offered to every registered producer in registration order, and each
//! producer self-selects by matching its own command name. Producer
//! handlers are pure predicates, so one producer can never block delivery
//! to its siblings.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::message::Message;
use crate::producer::SensorProducer;

/// Routes incoming commands to all registered producers.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    producers: Vec<Arc<SensorProducer>>,
}

impl CommandDispatcher {
    /// Creates a dispatcher with no producers registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a producer. Delivery follows registration order.
    pub fn register(&mut self, producer: Arc<SensorProducer>) {
        self.producers.push(producer);
    }

    /// Returns the number of registered producers.
    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Delivers one message to every registered producer.
    ///
    /// Non-command messages on the command queue are logged and dropped.
    pub fn dispatch(&self, message: &Message) {
        match message.command_name() {
            Some(command) => {
                tracing::debug!(command, producers = self.producers.len(), "dispatching command");
                for producer in &self.producers {
                    producer.handle_command(command);
                }
            }
            None => {
                tracing::warn!(kind = message.kind(), "ignoring non-command message on command queue");
            }
        }
    }

    /// Dequeues commands forever, fanning each one out to all producers.
    ///
    /// Returns when the command queue is closed (external cancellation).
    pub async fn run(&self, mut commands: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = commands.recv().await {
            self.dispatch(&message);
        }
        tracing::info!("command queue closed, dispatcher stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CMD_MEASURE_TEMPERATURE, CMD_TAKE_PICTURE};
    use crate::producer::{CameraSource, TemperatureSource};

    fn dispatcher_with_both() -> (CommandDispatcher, Arc<SensorProducer>, Arc<SensorProducer>) {
        let camera = Arc::new(SensorProducer::new(
            CameraSource::default(),
            CMD_TAKE_PICTURE,
            "hallway",
        ));
        let thermometer = Arc::new(SensorProducer::new(
            TemperatureSource::default(),
            CMD_MEASURE_TEMPERATURE,
            "hallway",
        ));

        let mut dispatcher = CommandDispatcher::new();
        dispatcher.register(Arc::clone(&camera));
        dispatcher.register(Arc::clone(&thermometer));
        (dispatcher, camera, thermometer)
    }

    async fn reading_ready(producer: &SensorProducer) -> bool {
        tokio::time::timeout(std::time::Duration::from_millis(50), producer.next_reading())
            .await
            .is_ok()
    }

    #[tokio::test]
    async fn command_arms_only_the_matching_producer() {
        let (dispatcher, camera, thermometer) = dispatcher_with_both();

        dispatcher.dispatch(&Message::command(CMD_TAKE_PICTURE));

        assert!(reading_ready(&camera).await);
        assert!(!reading_ready(&thermometer).await);
    }

    #[tokio::test]
    async fn unrecognized_command_arms_nobody() {
        let (dispatcher, camera, thermometer) = dispatcher_with_both();

        dispatcher.dispatch(&Message::command("reboot"));

        assert!(!reading_ready(&camera).await);
        assert!(!reading_ready(&thermometer).await);
    }

    #[tokio::test]
    async fn non_command_messages_are_dropped() {
        let (dispatcher, camera, thermometer) = dispatcher_with_both();

        let stray = Message::SensorData {
            sensor: "BME280".to_string(),
            location: "elsewhere".to_string(),
            time: None,
            data: crate::message::ReadingMap::new(),
        };
        dispatcher.dispatch(&stray);

        assert!(!reading_ready(&camera).await);
        assert!(!reading_ready(&thermometer).await);
    }

    #[tokio::test]
    async fn run_drains_the_queue_until_closed() {
        let (dispatcher, camera, _thermometer) = dispatcher_with_both();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(Message::command(CMD_TAKE_PICTURE)).unwrap();
        drop(tx);

        dispatcher.run(rx).await;
        assert!(reading_ready(&camera).await);
    }

    #[test]
    fn registration_order_is_kept() {
        let (dispatcher, _camera, _thermometer) = dispatcher_with_both();
        assert_eq!(dispatcher.producer_count(), 2);
        assert_eq!(dispatcher.producers[0].command(), CMD_TAKE_PICTURE);
        assert_eq!(dispatcher.producers[1].command(), CMD_MEASURE_TEMPERATURE);
    }
}

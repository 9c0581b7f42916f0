// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end relay tests over loopback TCP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use telelink::config::EdgeConfig;
use telelink::edge::EdgeDevice;
use telelink::hub::{self, BroadcastHub};
use telelink::message::{CMD_MEASURE_TEMPERATURE, Message};
use telelink::producer::{SensorProducer, TemperatureSource};
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Starts a hub on an ephemeral loopback port.
async fn start_hub() -> (Arc<BroadcastHub>, SocketAddr) {
    let hub = Arc::new(BroadcastHub::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serve_hub = Arc::clone(&hub);
    tokio::spawn(async move {
        let _ = hub::serve(listener, serve_hub).await;
    });

    (hub, addr)
}

/// Connects a raw WebSocket client to the hub.
async fn connect_client(addr: SocketAddr) -> Client {
    let (client, _response) = connect_async(format!("ws://{addr}")).await.unwrap();
    client
}

/// Receives the next text frame within the deadline.
async fn recv_text(client: &mut Client, deadline: Duration) -> Option<String> {
    let frame = tokio::time::timeout(deadline, client.next()).await.ok()??;
    match frame.ok()? {
        WsMessage::Text(text) => Some(text),
        _ => None,
    }
}

/// Waits until the hub has registered the expected number of peers.
async fn wait_for_peers(hub: &BroadcastHub, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while hub.peer_count().await != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "hub never reached {expected} peers"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// Broadcast fan-out
// ============================================================================

mod broadcast {
    use super::*;

    #[tokio::test]
    async fn message_reaches_all_peers_except_the_sender() {
        let (hub, addr) = start_hub().await;

        let mut a = connect_client(addr).await;
        let mut b = connect_client(addr).await;
        let mut c = connect_client(addr).await;
        wait_for_peers(&hub, 3).await;

        let payload = Message::command("take_picture").encode().unwrap();
        b.send(WsMessage::Text(payload.clone())).await.unwrap();

        let got_a = recv_text(&mut a, Duration::from_secs(5)).await.unwrap();
        let got_c = recv_text(&mut c, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got_a, payload);
        assert_eq!(got_c, payload);

        // Exactly once for recipients, zero times for the sender.
        assert!(recv_text(&mut a, Duration::from_millis(100)).await.is_none());
        assert!(recv_text(&mut b, Duration::from_millis(100)).await.is_none());
    }

    #[tokio::test]
    async fn departed_peer_is_pruned_and_delivery_continues() {
        let (hub, addr) = start_hub().await;

        let mut d1 = connect_client(addr).await;
        let mut d2 = connect_client(addr).await;
        let mut d3 = connect_client(addr).await;
        wait_for_peers(&hub, 3).await;

        d2.close(None).await.unwrap();
        wait_for_peers(&hub, 2).await;

        let payload = Message::SensorData {
            sensor: "BME280".to_string(),
            location: "living_room".to_string(),
            time: None,
            data: telelink::message::ReadingMap::new(),
        }
        .encode()
        .unwrap();
        d1.send(WsMessage::Text(payload.clone())).await.unwrap();

        let got = recv_text(&mut d3, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got, payload);
        assert!(recv_text(&mut d1, Duration::from_millis(100)).await.is_none());
    }

    #[tokio::test]
    async fn relayed_payload_is_verbatim() {
        let (hub, addr) = start_hub().await;

        let mut sender = connect_client(addr).await;
        let mut receiver = connect_client(addr).await;
        wait_for_peers(&hub, 2).await;

        // The hub never decodes; even non-protocol text passes through.
        sender
            .send(WsMessage::Text("not even json".to_string()))
            .await
            .unwrap();

        let got = recv_text(&mut receiver, Duration::from_secs(5)).await.unwrap();
        assert_eq!(got, "not even json");
    }
}

// ============================================================================
// Edge device round trip
// ============================================================================

mod edge_round_trip {
    use super::*;

    #[tokio::test]
    async fn command_from_controller_yields_one_reading() {
        let (hub, addr) = start_hub().await;

        let config = EdgeConfig::new(format!("ws://{addr}"), "living_room");
        let device = EdgeDevice::new(config).with_producer(SensorProducer::new(
            TemperatureSource::default(),
            CMD_MEASURE_TEMPERATURE,
            "living_room",
        ));
        tokio::spawn(async move {
            let _ = device.run().await;
        });

        let mut controller = connect_client(addr).await;
        wait_for_peers(&hub, 2).await;

        let command = Message::command(CMD_MEASURE_TEMPERATURE).encode().unwrap();
        controller.send(WsMessage::Text(command)).await.unwrap();

        let reply = recv_text(&mut controller, Duration::from_secs(5)).await.unwrap();
        let message = Message::decode(&reply).unwrap();
        match message {
            Message::SensorData {
                sensor,
                location,
                data,
                ..
            } => {
                assert_eq!(sensor, "BME280");
                assert_eq!(location, "living_room");
                assert!(data.contains_key("temperature"));
                assert!(data.contains_key("humidity"));
            }
            other => panic!("expected sensor_data, got {other:?}"),
        }

        // One command, one reading; the command is not echoed back.
        assert!(recv_text(&mut controller, Duration::from_millis(200)).await.is_none());
    }

    #[tokio::test]
    async fn unknown_command_produces_nothing() {
        let (hub, addr) = start_hub().await;

        let config = EdgeConfig::new(format!("ws://{addr}"), "garage");
        let device = EdgeDevice::new(config).with_producer(SensorProducer::new(
            TemperatureSource::default(),
            CMD_MEASURE_TEMPERATURE,
            "garage",
        ));
        tokio::spawn(async move {
            let _ = device.run().await;
        });

        let mut controller = connect_client(addr).await;
        wait_for_peers(&hub, 2).await;

        let command = Message::command("self_destruct").encode().unwrap();
        controller.send(WsMessage::Text(command)).await.unwrap();

        assert!(recv_text(&mut controller, Duration::from_millis(300)).await.is_none());
    }

    #[tokio::test]
    async fn two_devices_hear_each_other_through_the_hub() {
        let (hub, addr) = start_hub().await;

        // Device in the kitchen measures; a controller and a passive
        // observer are also connected.
        let config = EdgeConfig::new(format!("ws://{addr}"), "kitchen");
        let device = EdgeDevice::new(config).with_producer(SensorProducer::new(
            TemperatureSource::default(),
            CMD_MEASURE_TEMPERATURE,
            "kitchen",
        ));
        tokio::spawn(async move {
            let _ = device.run().await;
        });

        let mut controller = connect_client(addr).await;
        let mut observer = connect_client(addr).await;
        wait_for_peers(&hub, 3).await;

        let command = Message::command(CMD_MEASURE_TEMPERATURE).encode().unwrap();
        controller.send(WsMessage::Text(command.clone())).await.unwrap();

        // The observer sees both the relayed command and the reading.
        let first = recv_text(&mut observer, Duration::from_secs(5)).await.unwrap();
        assert_eq!(first, command);
        let second = recv_text(&mut observer, Duration::from_secs(5)).await.unwrap();
        assert_eq!(Message::decode(&second).unwrap().kind(), "sensor_data");

        // The controller sees only the reading.
        let reply = recv_text(&mut controller, Duration::from_secs(5)).await.unwrap();
        assert_eq!(Message::decode(&reply).unwrap().kind(), "sensor_data");
    }
}

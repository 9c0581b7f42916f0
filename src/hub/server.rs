// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket accept loop for the broadcast hub.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::TransportError;

use super::BroadcastHub;

/// Accepts connections forever, spawning one relay task per peer.
///
/// Each accepted socket is upgraded to a WebSocket, registered with the
/// hub, and pumped until it closes; the peer is unregistered exactly once
/// on every exit path.
///
/// # Errors
///
/// Returns `TransportError::Listener` if accepting on the listener fails.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use telelink::hub::{self, BroadcastHub};
/// use tokio::net::TcpListener;
///
/// # #[tokio::main]
/// # async fn main() -> telelink::Result<()> {
/// let hub = Arc::new(BroadcastHub::new());
/// let listener = TcpListener::bind("0.0.0.0:8765").await
///     .map_err(telelink::TransportError::Listener)?;
/// hub::serve(listener, hub).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(listener: TcpListener, hub: Arc<BroadcastHub>) -> Result<(), TransportError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "hub listening");
    }

    loop {
        let (stream, addr) = listener.accept().await?;
        tracing::debug!(%addr, "incoming connection");
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            handle_peer(stream, hub).await;
        });
    }
}

/// Upgrades one socket and relays frames until it closes.
async fn handle_peer(stream: TcpStream, hub: Arc<BroadcastHub>) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(err) => {
            tracing::warn!(error = %err, "websocket handshake failed");
            return;
        }
    };

    let (id, mut queue) = hub.add_peer().await;
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            // Broadcasts addressed to this peer.
            queued = queue.recv() => {
                let Some(text) = queued else { break };
                if let Err(err) = write.send(WsMessage::Text(text)).await {
                    tracing::warn!(peer = %id, error = %err, "send to peer failed");
                    break;
                }
            }

            // Frames from this peer, relayed to everyone else.
            frame = read.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        tracing::debug!(peer = %id, "message received");
                        hub.broadcast(id, &text).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(peer = %id, error = %err, "receive from peer failed");
                        break;
                    }
                }
            }
        }
    }

    hub.remove_peer(id).await;
}

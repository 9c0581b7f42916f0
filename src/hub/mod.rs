// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub-side broadcast relay.
//!
//! The [`BroadcastHub`] owns the registry of connected peers and fans
//! every received message out to all peers except the sender. The
//! registry is snapshotted before each broadcast sweep, so peers may be
//! added or removed concurrently without corrupting the iteration; peers
//! observed closed during a sweep are pruned idempotently.
//!
//! # Examples
//!
//! ```
//! use telelink::hub::BroadcastHub;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hub = BroadcastHub::new();
//! let (sender, _sender_rx) = hub.add_peer().await;
//! let (_other, mut other_rx) = hub.add_peer().await;
//!
//! hub.broadcast(sender, r#"{"type":"command","command":"take_picture"}"#).await;
//! assert!(other_rx.recv().await.is_some());
//! # }
//! ```

mod server;

pub use server::serve;

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Unique identifier for a connected peer.
///
/// Wraps a UUID v4 so peer identity is independent of the message
/// content flowing through the hub.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(Uuid);

impl PeerId {
    /// Creates a new unique peer identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show only first 8 characters for readability
        let short = &self.0.to_string()[..8];
        write!(f, "PeerId({short}...)")
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relay that forwards each peer's messages to every other peer.
///
/// Messages are forwarded verbatim as text; the hub never decodes them.
/// There is no ordering guarantee across recipients and no delivery
/// guarantee to a peer that disconnects during the sweep.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    peers: RwLock<HashMap<PeerId, mpsc::UnboundedSender<String>>>,
}

impl BroadcastHub {
    /// Creates a hub with no connected peers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new peer.
    ///
    /// Returns the peer's identity and the receiving end of its outgoing
    /// queue; the connection task forwards queued text to the socket.
    pub async fn add_peer(&self) -> (PeerId, mpsc::UnboundedReceiver<String>) {
        let id = PeerId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.write().await.insert(id, tx);
        tracing::info!(peer = %id, "peer connected");
        (id, rx)
    }

    /// Removes a peer from the registry.
    ///
    /// Idempotent: removing an unknown or already-removed peer is a no-op.
    /// Returns true if the peer was present.
    pub async fn remove_peer(&self, id: PeerId) -> bool {
        let removed = self.peers.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(peer = %id, "peer disconnected");
        }
        removed
    }

    /// Returns the number of currently registered peers.
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Forwards `message` to every peer except `sender`.
    ///
    /// Peers observed closed are pruned and skipped; a failed send is
    /// logged and the sweep continues with the next recipient. Returns
    /// the number of peers the message was delivered to.
    pub async fn broadcast(&self, sender: PeerId, message: &str) -> usize {
        // Snapshot membership so peers can come and go during the sweep.
        let snapshot: Vec<(PeerId, mpsc::UnboundedSender<String>)> = self
            .peers
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut stale = Vec::new();

        for (id, tx) in snapshot {
            if id == sender {
                continue;
            }
            if tx.is_closed() {
                stale.push(id);
                continue;
            }
            match tx.send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(peer = %id, error = %err, "failed to queue message for peer");
                    stale.push(id);
                }
            }
        }

        for id in stale {
            self.remove_peer(id).await;
        }

        tracing::debug!(from = %sender, delivered, "message broadcast");
        delivered
    }
}

//! Network seam: outbound broadcast/gossip trait and the in-process hub.
//!
//! The consensus driver only ever pushes opaque byte payloads outward and
//! receives [`Envelope`]s over an mpsc channel into its single task, which
//! is what keeps all Node state single-writer. Real transport is out of
//! scope; [`LocalHub`] fans messages out between in-process nodes for the
//! devnet binary and the integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::crypto::keys::SigningPublicKey;

/// Opaque node identifier within the permissioned network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// An inbound payload, still in wire form.
#[derive(Clone, Debug)]
pub enum Payload {
    /// A serialized [`SignedBlock`](crate::block::SignedBlock).
    Block(Vec<u8>),
    /// A serialized [`Transaction`](crate::transaction::Transaction).
    Transaction(Vec<u8>),
}

/// A payload tagged with its sender.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub from: NodeId,
    pub payload: Payload,
}

/// Outbound side of the network as the Node sees it.
///
/// `report_misbehavior` is a gossip signal naming a validator key whose
/// block signature failed verification; it carries no local penalty.
pub trait Network {
    fn broadcast_block(&self, from: NodeId, bytes: Vec<u8>);
    fn broadcast_transaction(&self, from: NodeId, bytes: Vec<u8>);
    fn report_misbehavior(&self, public_key: &SigningPublicKey);
}

impl<N: Network + ?Sized> Network for Arc<N> {
    fn broadcast_block(&self, from: NodeId, bytes: Vec<u8>) {
        (**self).broadcast_block(from, bytes);
    }
    fn broadcast_transaction(&self, from: NodeId, bytes: Vec<u8>) {
        (**self).broadcast_transaction(from, bytes);
    }
    fn report_misbehavior(&self, public_key: &SigningPublicKey) {
        (**self).report_misbehavior(public_key);
    }
}

/// In-process broadcast hub: every registered node except the sender
/// receives a copy of each broadcast.
#[derive(Default)]
pub struct LocalHub {
    inboxes: Mutex<HashMap<NodeId, mpsc::UnboundedSender<Envelope>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, returning the receiving end of its inbox.
    pub fn register(&self, node_id: NodeId) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes
            .lock()
            .expect("hub inbox registry poisoned")
            .insert(node_id, tx);
        rx
    }

    fn fan_out(&self, from: NodeId, payload: Payload) {
        let inboxes = self.inboxes.lock().expect("hub inbox registry poisoned");
        for (&node_id, sender) in inboxes.iter() {
            if node_id == from {
                continue;
            }
            // A closed inbox means the node task is gone; nothing to do.
            let _ = sender.send(Envelope {
                from,
                payload: payload.clone(),
            });
        }
    }
}

impl Network for LocalHub {
    fn broadcast_block(&self, from: NodeId, bytes: Vec<u8>) {
        self.fan_out(from, Payload::Block(bytes));
    }

    fn broadcast_transaction(&self, from: NodeId, bytes: Vec<u8>) {
        self.fan_out(from, Payload::Transaction(bytes));
    }

    fn report_misbehavior(&self, public_key: &SigningPublicKey) {
        tracing::warn!(
            validator = %hex::encode(&public_key.fingerprint()[..8]),
            "misbehavior gossip: invalid block signature"
        );
    }
}

//! Block and signed-block types.
//!
//! A block claims one slot and is attributable to exactly one validator via
//! the detached signature over its id. Assembly and signing are driven by
//! the [`Dag`](crate::dag::Dag), which knows the parent tip; this module
//! only defines the data and the signature discipline.

use serde::{Deserialize, Serialize};

use crate::clock::{Era, SlotNumber};
use crate::crypto::keys::{Signature, SigningKeypair, SigningPublicKey};
use crate::Hash;

/// Block payload: the header fields covered by the proposer's signature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// The slot this block was produced for.
    pub slot: SlotNumber,
    /// Era containing `slot`.
    pub era: Era,
    /// Id of the latest block known at assembly time (chain id at genesis).
    pub parent: Hash,
    /// Unix millis at assembly, advisory only.
    pub timestamp: u64,
    /// The validator that produced this block.
    pub proposer: SigningPublicKey,
}

impl Block {
    /// Compute the block id from its header fields.
    pub fn id(&self) -> Hash {
        let mut hasher = blake3::Hasher::new_derive_key("vesper.block.id");
        hasher.update(&self.slot.0.to_le_bytes());
        hasher.update(&self.era.0.to_le_bytes());
        hasher.update(&self.parent);
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(self.proposer.as_bytes());
        *hasher.finalize().as_bytes()
    }
}

/// A block plus the proposer's signature over its id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedBlock {
    pub block: Block,
    pub signature: Signature,
}

impl SignedBlock {
    /// Sign a block, consuming the unsigned payload.
    pub fn sign(block: Block, keypair: &SigningKeypair) -> Self {
        let signature = keypair.sign(&block.id());
        SignedBlock { block, signature }
    }

    /// Verify the signature against a specific validator's public key.
    pub fn verify_signature(&self, public_key: &SigningPublicKey) -> bool {
        public_key.verify(&self.block.id(), &self.signature)
    }

    /// Encode to the canonical wire form.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        crate::serialize(self)
    }

    /// Decode from the canonical wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        crate::deserialize(bytes)
    }
}

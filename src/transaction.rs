//! Beacon transaction types and their canonical binary codec.
//!
//! The consensus core only knows two transaction kinds, both belonging to
//! the commit-reveal randomness beacon. A commitment publishes an encrypted
//! share during an era's COMMIT window; the matching reveal discloses the
//! key during the REVEAL window, referencing the commitment by its hash.
//!
//! Wire payloads are opaque bytes to everything except this codec. Decoding
//! is a boundary operation: malformed bytes are a rejection, never a panic.

use serde::{Deserialize, Serialize};

use crate::Hash;

/// Unique content hash of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub Hash);

/// A commitment to a secret share, published before the key is known to
/// anyone else. The share is bound to the era's seed hash by the encryption
/// nonce (see [`crate::crypto::beacon`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRandomTransaction {
    pub encrypted_share: Vec<u8>,
}

/// Discloses the key that opens a previously published commitment.
/// `commit_reference` is the [`TxId`] hash of the exact prior commitment
/// transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealRandomTransaction {
    pub commit_reference: Hash,
    pub key: Vec<u8>,
}

/// A transaction admitted to (or destined for) the mempool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    CommitRandom(CommitRandomTransaction),
    RevealRandom(RevealRandomTransaction),
}

impl Transaction {
    /// Content hash identifying this transaction.
    pub fn tx_id(&self) -> TxId {
        match self {
            Transaction::CommitRandom(tx) => TxId(crate::hash_domain(
                b"vesper.tx.commit",
                &tx.encrypted_share,
            )),
            Transaction::RevealRandom(tx) => TxId(crate::hash_domain(
                b"vesper.tx.reveal",
                &crate::hash_concat(&[&tx.commit_reference, &tx.key]),
            )),
        }
    }

    /// Human-readable kind tag for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::CommitRandom(_) => "commit_random",
            Transaction::RevealRandom(_) => "reveal_random",
        }
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

//! # Vesper
//!
//! A permissioned, DAG-structured proof-of-stake consensus driver:
//! - **Duty-cycle node loop** — fixed-period ticks deciding whether to
//!   commit/reveal beacon randomness or produce a block
//! - **Commit-reveal randomness beacon** — one encrypted commitment per era,
//!   disclosed during the era's reveal window
//! - **Leader-gated block production** — at most one signed block per slot,
//!   produced only by the slot's assigned validator
//! - **Inbound message validation** — signature-checked blocks with
//!   misbehavior gossip, verifier-gated mempool admission for transactions

pub mod block;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod dag;
pub mod mempool;
pub mod network;
pub mod node;
pub mod permissions;
pub mod transaction;
pub mod verifier;

/// Protocol constants
pub mod constants {
    /// Duty-cycle tick period in seconds.
    pub const TICK_INTERVAL_SECS: u64 = 3;
    /// Wall-clock duration of one block slot in seconds.
    pub const SLOT_DURATION_SECS: u64 = 3;
    /// Number of slots in one era (one commit-reveal round).
    pub const SLOTS_PER_ERA: u64 = 12;
    /// The first slots of an era form the COMMIT window.
    pub const COMMIT_WINDOW_SLOTS: u64 = 4;
    /// The slots immediately after the COMMIT window form the REVEAL window.
    pub const REVEAL_WINDOW_SLOTS: u64 = 4;

    /// Size in bytes of a beacon reveal key.
    pub const REVEAL_KEY_BYTES: usize = 32;
    /// Size in bytes of the secret share hidden inside a commitment.
    pub const SHARE_BYTES: usize = 32;
    /// AEAD overhead on the encrypted share (Poly1305 tag).
    pub const SHARE_TAG_BYTES: usize = 16;

    /// Maximum number of transactions held in the mempool.
    pub const MEMPOOL_MAX_TXS: usize = 10_000;
    /// Maximum decoded size of any inbound network payload (1 MiB).
    pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

    /// Default number of validators in the local devnet binary.
    pub const DEFAULT_DEVNET_NODES: usize = 4;

    /// Compute the chain ID.
    pub fn chain_id() -> crate::Hash {
        crate::hash_domain(b"vesper.chain_id", b"vesper-devnet-v1")
    }
}

/// 32-byte hash used throughout the protocol
pub type Hash = [u8; 32];

/// Compute a domain-separated BLAKE3 hash.
///
/// The domain must be valid UTF-8 (all Vesper domains are ASCII); a non-UTF-8
/// domain is a programming error and panics.
pub fn hash_domain(domain: &[u8], data: &[u8]) -> Hash {
    let domain_str = std::str::from_utf8(domain).expect("hash_domain: domain must be valid UTF-8");
    let mut hasher = blake3::Hasher::new_derive_key(domain_str);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Compute BLAKE3 hash of length-prefixed concatenated slices.
///
/// Each part is prefixed with its length as a little-endian u64, preventing
/// ambiguous concatenation (e.g., `["AB","C"]` vs `["A","BC"]`).
pub fn hash_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Serialize a value using bincode with legacy (v1-compatible) encoding.
pub fn serialize<T: serde::Serialize>(val: &T) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::serde::encode_to_vec(val, bincode::config::legacy())
}

/// Deserialize a value using bincode with legacy (v1-compatible) encoding.
///
/// Rejects inputs larger than `MAX_MESSAGE_BYTES` to prevent OOM from
/// malicious oversized payloads.
pub fn deserialize<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
) -> Result<T, bincode::error::DecodeError> {
    if bytes.len() > constants::MAX_MESSAGE_BYTES {
        return Err(bincode::error::DecodeError::LimitExceeded);
    }
    let (val, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::legacy())?;
    Ok(val)
}

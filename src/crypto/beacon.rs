//! Secret splitting for the commit-reveal randomness beacon.
//!
//! A beacon participant draws a fresh random share, encrypts it under a
//! one-time ChaCha20-Poly1305 key, and publishes the ciphertext during the
//! era's COMMIT window. The key is held back as the *reveal key* and
//! disclosed during the REVEAL window; anyone can then recover the share
//! and fold it into the next era's seed.
//!
//! The nonce is derived from the era seed hash, which binds a ciphertext to
//! the era it was committed for. Nonce reuse is not a concern because every
//! commitment uses a fresh random key.

use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{REVEAL_KEY_BYTES, SHARE_BYTES, SHARE_TAG_BYTES};
use crate::Hash;

/// Errors from beacon secret recovery.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BeaconError {
    #[error("reveal key must be {REVEAL_KEY_BYTES} bytes, got {0}")]
    BadKeyLength(usize),
    #[error("encrypted share must be {expected} bytes, got {got}")]
    BadShareLength { expected: usize, got: usize },
    #[error("share decryption failed (key does not match commitment)")]
    DecryptFailed,
}

/// The key held back after a commit, disclosed in the reveal. Zeroized on
/// drop so no key material outlives the reveal.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RevealKey(pub(crate) [u8; REVEAL_KEY_BYTES]);

impl RevealKey {
    /// Access the raw key bytes (for placing into a reveal transaction).
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for RevealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RevealKey(REDACTED)")
    }
}

/// Derive the AEAD nonce for an era from its seed hash.
fn nonce_for_seed(seed_hash: &Hash) -> Nonce {
    let digest = crate::hash_domain(b"vesper.beacon.nonce", seed_hash);
    *Nonce::from_slice(&digest[..12])
}

/// Split a fresh random secret against the era's seed hash.
///
/// Returns the encrypted share (published in a
/// [`CommitRandomTransaction`](crate::transaction::Transaction::CommitRandom))
/// and the reveal key that decrypts it.
pub fn split_secret(seed_hash: &Hash) -> (Vec<u8>, RevealKey) {
    use rand::RngCore;

    let mut share = [0u8; SHARE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut share);
    let mut key = [0u8; REVEAL_KEY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut key);

    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .expect("REVEAL_KEY_BYTES matches the ChaCha20-Poly1305 key size");
    let encrypted = cipher
        .encrypt(&nonce_for_seed(seed_hash), share.as_slice())
        .expect("ChaCha20-Poly1305 encryption is infallible for in-memory buffers");

    share.zeroize();
    (encrypted, RevealKey(key))
}

/// Recover the secret share from a commitment's ciphertext and its disclosed
/// reveal key.
pub fn recover_share(
    seed_hash: &Hash,
    encrypted_share: &[u8],
    key: &[u8],
) -> Result<[u8; SHARE_BYTES], BeaconError> {
    if key.len() != REVEAL_KEY_BYTES {
        return Err(BeaconError::BadKeyLength(key.len()));
    }
    let expected = SHARE_BYTES + SHARE_TAG_BYTES;
    if encrypted_share.len() != expected {
        return Err(BeaconError::BadShareLength {
            expected,
            got: encrypted_share.len(),
        });
    }

    let cipher =
        ChaCha20Poly1305::new_from_slice(key).expect("key length checked above");
    let plain = cipher
        .decrypt(&nonce_for_seed(seed_hash), encrypted_share)
        .map_err(|_| BeaconError::DecryptFailed)?;
    plain
        .as_slice()
        .try_into()
        .map_err(|_| BeaconError::DecryptFailed)
}

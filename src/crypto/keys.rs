//! Validator key management using Ed25519 signatures.
//!
//! Block attribution in a permissioned network only needs a conventional
//! signature scheme; the actual scheme is replaceable and nothing outside
//! this module touches `ed25519_dalek` types directly.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Hash;

/// Ed25519 public key size in bytes.
const PUBLIC_KEY_BYTES: usize = 32;
/// Ed25519 detached signature size in bytes.
const SIGNATURE_BYTES: usize = 64;

/// An Ed25519 signing public key (32 bytes).
///
/// Inner bytes are `pub(crate)` to prevent external construction of
/// unvalidated keys. Use [`SigningKeypair::generate`] or deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningPublicKey(pub(crate) [u8; PUBLIC_KEY_BYTES]);

/// An Ed25519 signing secret key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecretKey(pub(crate) [u8; 32]);

/// An Ed25519 detached signature (64 bytes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(pub(crate) Vec<u8>);

impl Signature {
    /// Access the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.0, s)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = serde::Deserialize::deserialize(d)?;
        if bytes.len() != SIGNATURE_BYTES {
            return Err(serde::de::Error::custom(format!(
                "invalid Ed25519 signature: expected {} bytes, got {}",
                SIGNATURE_BYTES,
                bytes.len()
            )));
        }
        Ok(Signature(bytes))
    }
}

impl SigningPublicKey {
    /// Access the raw public key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Short identity hash of this key, used as a validator identifier in
    /// logs and misbehavior reports.
    pub fn fingerprint(&self) -> Hash {
        crate::hash_domain(b"vesper.key.fingerprint", &self.0)
    }

    /// Verify a detached signature over `message`.
    ///
    /// Returns `false` for malformed keys or signatures rather than
    /// surfacing a parse error; an unverifiable signature is simply invalid.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig_bytes: [u8; SIGNATURE_BYTES] = match signature.0.as_slice().try_into() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        key.verify(message, &sig).is_ok()
    }
}

/// An Ed25519 signing keypair.
///
/// Implements [`Clone`] because the keypair is shared between the node's
/// block producer and the devnet wiring. The secret key is zeroized on drop
/// via [`ZeroizeOnDrop`] on [`SigningSecretKey`].
#[derive(Clone)]
pub struct SigningKeypair {
    pub public: SigningPublicKey,
    pub secret: SigningSecretKey,
}

impl SigningKeypair {
    /// Generate a new random Ed25519 keypair.
    pub fn generate() -> Self {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        SigningKeypair {
            public: SigningPublicKey(signing.verifying_key().to_bytes()),
            secret: SigningSecretKey(signing.to_bytes()),
        }
    }

    /// Reconstruct a keypair from secret key bytes. The public key is
    /// derived from the secret key.
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        let signing = ed25519_dalek::SigningKey::from_bytes(&secret);
        SigningKeypair {
            public: SigningPublicKey(signing.verifying_key().to_bytes()),
            secret: SigningSecretKey(secret),
        }
    }

    /// Sign a message, producing a detached signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signing = ed25519_dalek::SigningKey::from_bytes(&self.secret.0);
        Signature(signing.sign(message).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("public", &hex::encode(&self.public.0[..8]))
            .field("secret", &"REDACTED")
            .finish()
    }
}

//! Cryptographic primitives: validator signing keys and the beacon
//! secret-splitting construction.

pub mod beacon;
pub mod keys;

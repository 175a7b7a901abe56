//! Leader selection over the permissioned validator registry.
//!
//! Each slot is assigned exactly one validator, derived deterministically
//! from the slot's era seed and the slot number. Every node computes the
//! same assignment from the same DAG history; there is no communication.

use crate::clock::{self, SlotNumber};
use crate::crypto::keys::SigningPublicKey;
use crate::dag::Dag;

/// Deterministic slot-to-validator assignment.
pub struct Permissions;

impl Permissions {
    /// The validator entitled to produce the block for `slot`, or `None`
    /// when the registry is empty (a misconfigured network).
    pub fn leader_for_slot(dag: &Dag, slot: SlotNumber) -> Option<&SigningPublicKey> {
        let validators = dag.validators();
        if validators.is_empty() {
            return None;
        }
        let seed = dag.era_seed_hash(clock::era_of(slot));
        let digest = crate::hash_domain(
            b"vesper.leader",
            &crate::hash_concat(&[&seed, &slot.0.to_le_bytes()]),
        );
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let index = u64::from_le_bytes(raw) as usize % validators.len();
        Some(&validators[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::SigningKeypair;

    fn registry(n: usize) -> (Vec<SigningKeypair>, Dag) {
        let keypairs: Vec<SigningKeypair> = (0..n).map(|_| SigningKeypair::generate()).collect();
        let validators = keypairs.iter().map(|kp| kp.public.clone()).collect();
        (keypairs, Dag::new(0, validators))
    }

    #[test]
    fn assignment_is_deterministic() {
        let (_kps, dag) = registry(5);
        let a = Permissions::leader_for_slot(&dag, SlotNumber(17)).unwrap();
        let b = Permissions::leader_for_slot(&dag, SlotNumber(17)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn leader_is_always_a_registered_validator() {
        let (_kps, dag) = registry(3);
        for slot in 0..100 {
            let leader = Permissions::leader_for_slot(&dag, SlotNumber(slot)).unwrap();
            assert!(dag.validators().contains(leader));
        }
    }

    #[test]
    fn every_validator_gets_a_turn() {
        // With 3 validators and a few eras of slots, every key should lead
        // at least once. Not a fairness proof, just a sanity bound.
        let (_kps, dag) = registry(3);
        let mut seen = std::collections::HashSet::new();
        for slot in 0..200 {
            let leader = Permissions::leader_for_slot(&dag, SlotNumber(slot)).unwrap();
            seen.insert(leader.fingerprint());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn empty_registry_has_no_leader() {
        let dag = Dag::new(0, vec![]);
        assert!(Permissions::leader_for_slot(&dag, SlotNumber(0)).is_none());
    }

    #[test]
    fn single_validator_always_leads() {
        let (kps, dag) = registry(1);
        for slot in 0..20 {
            let leader = Permissions::leader_for_slot(&dag, SlotNumber(slot)).unwrap();
            assert_eq!(*leader, kps[0].public);
        }
    }
}

//! In-memory ledger: the DAG of accepted blocks plus the derived chain
//! state the consensus driver reads.
//!
//! The `Dag` owns four things:
//! - the wall-clock anchor mapping real time onto slot numbers,
//! - the slot → signed-block map ("has this slot been filled?" is answered
//!   and settled atomically inside [`Dag::accept_block`]),
//! - the registry of observed beacon commitments, so reveals can be checked
//!   against the exact prior commitment transaction,
//! - the per-era register of observed revealed entropy.
//!
//! Era seed hashes derive from the chain id and the previous era's
//! accepted-block history only. Gossip arrival order and which reveals a
//! node happens to observe never influence the seed, so any two nodes
//! holding the same blocks agree on every seed and every slot leader.
//!
//! Fork acceptance and finality are out of scope: one block per slot,
//! first valid arrival wins.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::block::{Block, SignedBlock};
use crate::clock::{self, Era, SlotNumber};
use crate::crypto::keys::{SigningKeypair, SigningPublicKey};
use crate::Hash;

/// Errors from ledger operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum DagError {
    #[error("slot {0} already has a block")]
    SlotOccupied(SlotNumber),
    #[error("block claims slot {claimed} but was submitted for slot {submitted}")]
    SlotMismatch {
        submitted: SlotNumber,
        claimed: SlotNumber,
    },
}

/// The in-memory ledger.
#[derive(Clone, Debug)]
pub struct Dag {
    /// Unix seconds of slot 0.
    genesis_time: u64,
    chain_id: Hash,
    /// The permissioned validator registry, fixed at genesis. Never empty
    /// in a functioning network.
    validators: Vec<SigningPublicKey>,
    /// Accepted blocks by slot.
    blocks: BTreeMap<SlotNumber, SignedBlock>,
    /// Observed commitment transactions: tx hash → era it was committed in.
    commits: HashMap<Hash, Era>,
    /// Observed revealed entropy per era. Diagnostic register only; seeds
    /// and leader selection read block history, never this map.
    randomness: HashMap<Era, Hash>,
}

impl Dag {
    /// Create a ledger anchored at the given genesis time with a fixed
    /// validator registry.
    pub fn new(genesis_time: u64, validators: Vec<SigningPublicKey>) -> Self {
        Dag {
            genesis_time,
            chain_id: crate::constants::chain_id(),
            validators,
            blocks: BTreeMap::new(),
            commits: HashMap::new(),
            randomness: HashMap::new(),
        }
    }

    /// The slot the wall clock currently falls in. Before genesis this is
    /// slot 0.
    pub fn current_slot(&self) -> SlotNumber {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        SlotNumber(now.saturating_sub(self.genesis_time) / crate::constants::SLOT_DURATION_SECS)
    }

    /// The beacon phase of the current slot.
    pub fn current_phase(&self) -> clock::EpochPhase {
        clock::phase_of(self.current_slot())
    }

    /// The era containing the given slot.
    pub fn era_of(&self, slot: SlotNumber) -> Era {
        clock::era_of(slot)
    }

    /// Seed hash for an era: chain id, era number, and the accepted-block
    /// history of the previous era. A pure function of DAG history.
    pub fn era_seed_hash(&self, era: Era) -> Hash {
        let prev_history = match era.0.checked_sub(1) {
            Some(prev) => self.era_block_history(Era(prev)),
            None => [0u8; 32],
        };
        crate::hash_domain(
            b"vesper.era_seed",
            &crate::hash_concat(&[&self.chain_id, &era.0.to_le_bytes(), &prev_history]),
        )
    }

    /// Digest over the blocks accepted for an era's slots, in slot order.
    fn era_block_history(&self, era: Era) -> Hash {
        let start = clock::era_start(era);
        let end = SlotNumber(start.0.saturating_add(crate::constants::SLOTS_PER_ERA));
        let mut hasher = blake3::Hasher::new_derive_key("vesper.era_history");
        for (slot, signed) in self.blocks.range(start..end) {
            hasher.update(&slot.0.to_le_bytes());
            hasher.update(&signed.block.id());
        }
        *hasher.finalize().as_bytes()
    }

    /// Whether a block has been accepted for the given slot.
    pub fn slot_has_block(&self, slot: SlotNumber) -> bool {
        self.blocks.contains_key(&slot)
    }

    /// The validator registry.
    pub fn validators(&self) -> &[SigningPublicKey] {
        &self.validators
    }

    /// Id of the highest accepted block, or the chain id with no blocks yet.
    pub fn latest_block_id(&self) -> Hash {
        self.blocks
            .last_key_value()
            .map(|(_, signed)| signed.block.id())
            .unwrap_or(self.chain_id)
    }

    /// Assemble the block content for `slot` and sign it with the given key.
    pub fn sign_and_assemble_block(&self, slot: SlotNumber, keypair: &SigningKeypair) -> SignedBlock {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let block = Block {
            slot,
            era: clock::era_of(slot),
            parent: self.latest_block_id(),
            timestamp,
            proposer: keypair.public.clone(),
        };
        SignedBlock::sign(block, keypair)
    }

    /// Accept a signed block for `slot`.
    ///
    /// The occupancy check and the insert happen under one `&mut` borrow,
    /// so "check then insert" cannot race with another writer.
    pub fn accept_block(&mut self, slot: SlotNumber, signed: SignedBlock) -> Result<(), DagError> {
        if signed.block.slot != slot {
            return Err(DagError::SlotMismatch {
                submitted: slot,
                claimed: signed.block.slot,
            });
        }
        if self.blocks.contains_key(&slot) {
            return Err(DagError::SlotOccupied(slot));
        }
        self.blocks.insert(slot, signed);
        Ok(())
    }

    /// Get the accepted block for a slot, if any.
    pub fn block_at(&self, slot: SlotNumber) -> Option<&SignedBlock> {
        self.blocks.get(&slot)
    }

    /// Record an observed commitment transaction. Idempotent: the era of
    /// first observation sticks.
    pub fn register_commit(&mut self, tx_hash: Hash, era: Era) {
        self.commits.entry(tx_hash).or_insert(era);
    }

    /// The era a commitment transaction was observed in, if known.
    pub fn commit_era(&self, tx_hash: &Hash) -> Option<Era> {
        self.commits.get(tx_hash).copied()
    }

    /// Record a revealed share in the era's observed-entropy register.
    ///
    /// XOR-folded over per-share digests, so the register is independent of
    /// gossip arrival order. The caller must not re-record the same reveal.
    pub fn absorb_reveal(&mut self, era: Era, share: &[u8]) {
        let digest = crate::hash_domain(b"vesper.era_randomness", share);
        let register = self.randomness.entry(era).or_insert([0u8; 32]);
        for (acc, byte) in register.iter_mut().zip(digest.iter()) {
            *acc ^= byte;
        }
    }

    /// Observed revealed entropy for an era, if any reveal was absorbed.
    pub fn era_randomness(&self, era: Era) -> Option<Hash> {
        self.randomness.get(&era).copied()
    }

    /// Number of accepted blocks (diagnostics).
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

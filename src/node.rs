//! The consensus driver: duty-cycle loop, randomness beacon coordinator,
//! block producer, and inbound message handlers.
//!
//! A `Node` is a long-lived object driven from exactly one task: the
//! [`run`](Node::run) loop selects between the inbound message channel and
//! a fixed-period tick, so every mutation of node state (the pending
//! beacon commitment, the DAG, the mempool) happens in a single logical
//! thread of control. Callers that bypass `run` and invoke the handlers
//! directly must serialize those calls themselves.
//!
//! Per-message failures (undecodable payloads, bad signatures, invalid
//! transactions) are absorbed here and surface only as diagnostics or
//! misbehavior gossip. Collaborator failures propagate to the loop, which
//! logs them and continues on the next tick.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::block::SignedBlock;
use crate::clock::{self, Era, EpochPhase, SlotNumber};
use crate::crypto::beacon::{self, RevealKey};
use crate::crypto::keys::SigningKeypair;
use crate::dag::{Dag, DagError};
use crate::mempool::{Mempool, MempoolError};
use crate::network::{Envelope, Network, NodeId, Payload};
use crate::permissions::Permissions;
use crate::transaction::{
    CommitRandomTransaction, RevealRandomTransaction, Transaction,
};
use crate::verifier::TransactionVerifier;
use crate::Hash;

/// Errors the duty cycle cannot absorb locally.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Dag(#[from] DagError),
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

/// The node's pending beacon commitment. At most one exists at any time;
/// it is owned and mutated exclusively by the beacon steps below.
#[derive(Debug)]
struct RandomCommitment {
    /// Era the commitment was broadcast for.
    era: Era,
    /// Hash of the broadcast commitment transaction — the reveal's
    /// `commit_reference`.
    commit_hash: Hash,
    /// Key that opens the commitment, disclosed at reveal time.
    reveal_key: RevealKey,
}

/// The consensus driver.
pub struct Node<N: Network> {
    node_id: NodeId,
    keypair: SigningKeypair,
    dag: Dag,
    mempool: Mempool,
    network: N,
    /// Zero or one pending commitment; see state machine in the beacon
    /// steps. Dropping a commitment zeroizes its reveal key.
    commitment: Option<RandomCommitment>,
}

impl<N: Network> Node<N> {
    /// Create a node around its collaborators: an existing ledger, the
    /// transaction pool, and a network handle.
    pub fn new(
        node_id: NodeId,
        keypair: SigningKeypair,
        dag: Dag,
        mempool: Mempool,
        network: N,
    ) -> Self {
        Node {
            node_id,
            keypair,
            dag,
            mempool,
            network,
            commitment: None,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Read access to the ledger (diagnostics and tests).
    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// Read access to the mempool (diagnostics and tests).
    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Era of the pending beacon commitment, if one exists.
    pub fn commitment_era(&self) -> Option<Era> {
        self.commitment.as_ref().map(|c| c.era)
    }

    /// Run the duty cycle until the process shuts down.
    ///
    /// Never returns. Each tick handles beacon duties for the current
    /// phase and then attempts block production; inbound envelopes are
    /// dispatched between ticks. Errors are logged and the cycle continues.
    pub async fn run(&mut self, mut inbox: mpsc::UnboundedReceiver<Envelope>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        loop {
            tokio::select! {
                Some(envelope) = inbox.recv() => {
                    if let Err(e) = self.handle_envelope(envelope) {
                        tracing::error!(node = %self.node_id, error = %e, "message handling failed");
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        tracing::error!(node = %self.node_id, error = %e, "duty cycle tick failed");
                    }
                }
            }
        }
    }

    /// One duty-cycle tick at the wall clock's current slot.
    pub fn tick(&mut self) -> Result<(), NodeError> {
        let slot = self.dag.current_slot();
        self.tick_at(slot)
    }

    /// One duty-cycle tick pinned to a specific slot.
    pub fn tick_at(&mut self, slot: SlotNumber) -> Result<(), NodeError> {
        match clock::phase_of(slot) {
            EpochPhase::Commit => self.try_commit_random(slot)?,
            EpochPhase::Reveal => self.try_reveal_random(slot)?,
            EpochPhase::Other => {}
        }
        self.try_produce_block(slot)
    }

    // ── Random beacon coordinator ──

    /// Commit step, invoked during COMMIT windows.
    ///
    /// Proceeds only with no pending commitment, or with a stale one from a
    /// strictly earlier era (a missed reveal never blocks future
    /// participation). Repeat ticks within the same era are no-ops, so at
    /// most one commitment is broadcast per era.
    fn try_commit_random(&mut self, slot: SlotNumber) -> Result<(), NodeError> {
        let era = clock::era_of(slot);
        match &self.commitment {
            None => {}
            Some(pending) if pending.era < era => {
                tracing::debug!(
                    node = %self.node_id,
                    stale_era = %pending.era,
                    era = %era,
                    "abandoning unrevealed commitment from earlier era"
                );
            }
            Some(_) => return Ok(()),
        }

        let seed = self.dag.era_seed_hash(era);
        let (encrypted_share, reveal_key) = beacon::split_secret(&seed);
        let tx = Transaction::CommitRandom(CommitRandomTransaction { encrypted_share });
        let commit_hash = tx.tx_id().0;
        let raw = tx.encode()?;

        self.commitment = Some(RandomCommitment {
            era,
            commit_hash,
            reveal_key,
        });
        self.network.broadcast_transaction(self.node_id, raw);
        tracing::info!(
            node = %self.node_id,
            era = %era,
            commit = %hex::encode(&commit_hash[..8]),
            "broadcast beacon commitment"
        );
        Ok(())
    }

    /// Reveal step, invoked during REVEAL windows.
    ///
    /// Proceeds only with a pending commitment for exactly the current era;
    /// otherwise silently skips (a node that never committed, or committed
    /// for a different era, simply sits out this round). The commitment is
    /// deleted after broadcast, so no key material survives the reveal and
    /// at most one reveal goes out per era.
    fn try_reveal_random(&mut self, slot: SlotNumber) -> Result<(), NodeError> {
        let era = clock::era_of(slot);
        let Some(pending) = self.commitment.as_ref() else {
            return Ok(());
        };
        if pending.era != era {
            return Ok(());
        }

        let tx = Transaction::RevealRandom(RevealRandomTransaction {
            commit_reference: pending.commit_hash,
            key: pending.reveal_key.as_bytes().to_vec(),
        });
        let raw = tx.encode()?;
        self.commitment = None;
        self.network.broadcast_transaction(self.node_id, raw);
        tracing::info!(node = %self.node_id, era = %era, "broadcast beacon reveal");
        Ok(())
    }

    // ── Block producer ──

    /// Produce and broadcast a block iff this node leads the slot and the
    /// slot is still empty. The block is accepted locally before the
    /// broadcast, which is what makes repeat ticks within a slot no-ops.
    fn try_produce_block(&mut self, slot: SlotNumber) -> Result<(), NodeError> {
        let is_leader = Permissions::leader_for_slot(&self.dag, slot)
            .is_some_and(|leader| *leader == self.keypair.public);
        if !is_leader || self.dag.slot_has_block(slot) {
            return Ok(());
        }

        let signed = self.dag.sign_and_assemble_block(slot, &self.keypair);
        let block_id = signed.block.id();
        let raw = signed.encode()?;
        self.dag.accept_block(slot, signed)?;
        self.network.broadcast_block(self.node_id, raw);
        tracing::info!(
            node = %self.node_id,
            slot = %slot,
            block = %hex::encode(&block_id[..8]),
            "produced block"
        );
        Ok(())
    }

    // ── Message handlers ──

    /// Dispatch an inbound envelope to the matching handler.
    fn handle_envelope(&mut self, envelope: Envelope) -> Result<(), NodeError> {
        match envelope.payload {
            Payload::Block(bytes) => self.handle_block_message(envelope.from, &bytes),
            Payload::Transaction(bytes) => self.handle_transaction_message(envelope.from, &bytes),
        }
    }

    /// Validate and admit an inbound signed block.
    ///
    /// The signature is checked against the validator entitled to the
    /// block's slot. A failed check emits exactly one misbehavior report
    /// naming that validator; the block is never handed to the DAG.
    pub fn handle_block_message(&mut self, from: NodeId, raw: &[u8]) -> Result<(), NodeError> {
        let signed = match SignedBlock::decode(raw) {
            Ok(signed) => signed,
            Err(e) => {
                tracing::debug!(node = %self.node_id, %from, error = %e, "rejected undecodable block");
                return Ok(());
            }
        };
        let slot = signed.block.slot;
        let block_id = signed.block.id();
        tracing::info!(
            node = %self.node_id,
            %from,
            slot = %slot,
            block = %hex::encode(&block_id[..8]),
            "received block"
        );

        let Some(leader) = Permissions::leader_for_slot(&self.dag, slot).cloned() else {
            tracing::warn!(node = %self.node_id, slot = %slot, "no leader for slot, dropping block");
            return Ok(());
        };

        if !signed.verify_signature(&leader) {
            tracing::warn!(
                node = %self.node_id,
                %from,
                slot = %slot,
                leader = %hex::encode(&leader.fingerprint()[..8]),
                "invalid block signature, reporting misbehavior"
            );
            self.network.report_misbehavior(&leader);
            return Ok(());
        }

        match self.dag.accept_block(slot, signed) {
            Ok(()) => {
                tracing::info!(node = %self.node_id, slot = %slot, "accepted block");
                Ok(())
            }
            // A duplicate arrival for a filled slot is a normal gossip race.
            Err(DagError::SlotOccupied(_)) => {
                tracing::debug!(node = %self.node_id, slot = %slot, "slot already filled");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validate and admit an inbound transaction.
    ///
    /// Invalid transactions are dropped without penalty; valid ones enter
    /// the mempool, and beacon consequences (commit registration, revealed
    /// entropy) are applied to the DAG. Replayed transactions are dropped
    /// before any consequence applies twice.
    pub fn handle_transaction_message(&mut self, from: NodeId, raw: &[u8]) -> Result<(), NodeError> {
        let tx = match Transaction::decode(raw) {
            Ok(tx) => tx,
            Err(e) => {
                tracing::debug!(node = %self.node_id, %from, error = %e, "rejected undecodable transaction");
                return Ok(());
            }
        };
        let tx_id = tx.tx_id();
        tracing::info!(
            node = %self.node_id,
            %from,
            tx = %hex::encode(&tx_id.0[..8]),
            kind = tx.kind(),
            "received transaction"
        );

        if self.mempool.contains(&tx_id) {
            tracing::debug!(node = %self.node_id, tx = %hex::encode(&tx_id.0[..8]), "duplicate transaction");
            return Ok(());
        }

        if let Err(reason) = TransactionVerifier::new(&self.dag).check(&tx) {
            tracing::debug!(node = %self.node_id, %from, %reason, "dropped invalid transaction");
            return Ok(());
        }

        match &tx {
            Transaction::CommitRandom(_) => {
                let era = clock::era_of(self.dag.current_slot());
                self.dag.register_commit(tx_id.0, era);
            }
            Transaction::RevealRandom(reveal) => self.absorb_reveal(reveal),
        }

        match self.mempool.admit(tx) {
            Ok(_) => {
                tracing::info!(node = %self.node_id, tx = %hex::encode(&tx_id.0[..8]), "admitted to mempool");
            }
            Err(MempoolError::Duplicate) => {
                tracing::debug!(node = %self.node_id, tx = %hex::encode(&tx_id.0[..8]), "duplicate transaction");
            }
        }
        Ok(())
    }

    /// Recover the share disclosed by a validated reveal and record it in
    /// the era's observed-entropy register.
    ///
    /// The referenced commitment may have been evicted from the mempool; a
    /// reveal whose share can no longer be recovered contributes nothing.
    fn absorb_reveal(&mut self, reveal: &RevealRandomTransaction) {
        let Some(era) = self.dag.commit_era(&reveal.commit_reference) else {
            return;
        };
        let Some(Transaction::CommitRandom(commit)) = self
            .mempool
            .get(&crate::transaction::TxId(reveal.commit_reference))
            .cloned()
        else {
            tracing::debug!(
                node = %self.node_id,
                commit = %hex::encode(&reveal.commit_reference[..8]),
                "referenced commitment no longer pooled, skipping entropy absorption"
            );
            return;
        };

        let seed = self.dag.era_seed_hash(era);
        match beacon::recover_share(&seed, &commit.encrypted_share, &reveal.key) {
            Ok(share) => {
                self.dag.absorb_reveal(era, &share);
                tracing::debug!(node = %self.node_id, era = %era, "absorbed revealed entropy");
            }
            Err(e) => {
                tracing::debug!(
                    node = %self.node_id,
                    era = %era,
                    error = %e,
                    "reveal key does not open referenced commitment"
                );
            }
        }
    }
}

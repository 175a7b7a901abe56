//! Consensus-driver property tests: beacon state machine, block-production
//! idempotence, and message-handler validation rules.
//!
//! Ticks are pinned to explicit slots so every property is deterministic;
//! the recording network captures everything the node broadcasts.

use std::sync::{Arc, Mutex};

use vesper::clock::{self, Era, SlotNumber};
use vesper::constants::{COMMIT_WINDOW_SLOTS, SLOTS_PER_ERA};
use vesper::crypto::keys::{SigningKeypair, SigningPublicKey};
use vesper::dag::Dag;
use vesper::mempool::Mempool;
use vesper::network::{Network, NodeId};
use vesper::node::Node;
use vesper::permissions::Permissions;
use vesper::transaction::{CommitRandomTransaction, Transaction};

// ── Helpers ─────────────────────────────────────────────────────────────

/// Captures every outbound call the node makes.
#[derive(Default)]
struct RecordingNetwork {
    inner: Mutex<Records>,
}

#[derive(Default)]
struct Records {
    blocks: Vec<(NodeId, Vec<u8>)>,
    transactions: Vec<(NodeId, Vec<u8>)>,
    misbehavior: Vec<SigningPublicKey>,
}

impl Network for RecordingNetwork {
    fn broadcast_block(&self, from: NodeId, bytes: Vec<u8>) {
        self.inner.lock().unwrap().blocks.push((from, bytes));
    }
    fn broadcast_transaction(&self, from: NodeId, bytes: Vec<u8>) {
        self.inner.lock().unwrap().transactions.push((from, bytes));
    }
    fn report_misbehavior(&self, public_key: &SigningPublicKey) {
        self.inner.lock().unwrap().misbehavior.push(public_key.clone());
    }
}

impl RecordingNetwork {
    fn block_count(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }
    fn transactions(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }
    fn misbehavior(&self) -> Vec<SigningPublicKey> {
        self.inner.lock().unwrap().misbehavior.clone()
    }
}

/// A single-validator node: always the leader, ticks pinned by the tests.
fn solo_node() -> (Node<Arc<RecordingNetwork>>, Arc<RecordingNetwork>) {
    let net = Arc::new(RecordingNetwork::default());
    let kp = SigningKeypair::generate();
    let dag = Dag::new(0, vec![kp.public.clone()]);
    let node = Node::new(
        NodeId(0),
        kp,
        dag,
        Mempool::with_defaults(),
        Arc::clone(&net),
    );
    (node, net)
}

/// First slot in `range` led by `key`.
fn leader_slot(dag: &Dag, key: &SigningPublicKey, range: std::ops::Range<u64>) -> SlotNumber {
    for raw in range {
        let slot = SlotNumber(raw);
        if Permissions::leader_for_slot(dag, slot) == Some(key) {
            return slot;
        }
    }
    panic!("no slot led by the given key in range");
}

fn commit_slot(era: Era) -> SlotNumber {
    clock::era_start(era)
}

fn reveal_slot(era: Era) -> SlotNumber {
    SlotNumber(clock::era_start(era).0 + COMMIT_WINDOW_SLOTS)
}

// ── Block producer ──────────────────────────────────────────────────────

#[test]
fn block_production_is_idempotent_within_slot() {
    let (mut node, net) = solo_node();
    // Slot 42 sits in a REVEAL window with no pending commitment, so the
    // only duty is block production.
    let slot = SlotNumber(42);

    node.tick_at(slot).unwrap();
    assert_eq!(net.block_count(), 1);
    assert!(node.dag().slot_has_block(slot));

    node.tick_at(slot).unwrap();
    node.tick_at(slot).unwrap();
    assert_eq!(net.block_count(), 1, "repeat ticks must not re-produce");
}

#[test]
fn non_leader_produces_nothing() {
    let net = Arc::new(RecordingNetwork::default());
    let ours = SigningKeypair::generate();
    let other = SigningKeypair::generate();
    let dag = Dag::new(0, vec![ours.public.clone(), other.public.clone()]);
    let foreign_slot = leader_slot(&dag, &other.public, 8..1000);

    let mut node = Node::new(
        NodeId(0),
        ours,
        dag,
        Mempool::with_defaults(),
        Arc::clone(&net),
    );
    node.tick_at(foreign_slot).unwrap();

    assert_eq!(net.block_count(), 0);
    assert!(!node.dag().slot_has_block(foreign_slot));
}

// ── Beacon coordinator ──────────────────────────────────────────────────

#[test]
fn at_most_one_commit_per_era() {
    let (mut node, net) = solo_node();
    let slot = commit_slot(Era(5));

    node.tick_at(slot).unwrap();
    node.tick_at(SlotNumber(slot.0 + 1)).unwrap();
    node.tick_at(SlotNumber(slot.0 + 2)).unwrap();

    assert_eq!(net.transactions().len(), 1);
    assert_eq!(node.commitment_era(), Some(Era(5)));
}

#[test]
fn reveal_references_the_actual_commit_and_clears_state() {
    let (mut node, net) = solo_node();

    node.tick_at(commit_slot(Era(5))).unwrap();
    node.tick_at(reveal_slot(Era(5))).unwrap();

    let txs = net.transactions();
    assert_eq!(txs.len(), 2);
    let commit = Transaction::decode(&txs[0]).unwrap();
    let reveal = Transaction::decode(&txs[1]).unwrap();

    match (&commit, &reveal) {
        (Transaction::CommitRandom(_), Transaction::RevealRandom(r)) => {
            assert_eq!(
                r.commit_reference,
                commit.tx_id().0,
                "reveal must reference the actual prior commitment"
            );
            assert_eq!(r.key.len(), vesper::constants::REVEAL_KEY_BYTES);
        }
        other => panic!("expected commit then reveal, got {:?}", other),
    }

    assert_eq!(node.commitment_era(), None, "reveal must clear the commitment");

    // Repeat ticks in the reveal window send nothing further.
    node.tick_at(SlotNumber(reveal_slot(Era(5)).0 + 1)).unwrap();
    assert_eq!(net.transactions().len(), 2);
}

#[test]
fn no_reveal_without_matching_commitment() {
    let (mut node, net) = solo_node();
    node.tick_at(reveal_slot(Era(5))).unwrap();
    assert!(net.transactions().is_empty());
    assert_eq!(node.commitment_era(), None);
}

#[test]
fn missed_reveal_does_not_lock_out_future_eras() {
    let (mut node, net) = solo_node();

    node.tick_at(commit_slot(Era(5))).unwrap();
    assert_eq!(node.commitment_era(), Some(Era(5)));

    // Never reveal; jump straight to era 6's commit window.
    node.tick_at(commit_slot(Era(6))).unwrap();

    let txs = net.transactions();
    assert_eq!(txs.len(), 2, "stale commitment must not block a new commit");
    assert!(matches!(
        Transaction::decode(&txs[1]).unwrap(),
        Transaction::CommitRandom(_)
    ));
    assert_eq!(node.commitment_era(), Some(Era(6)));
}

#[test]
fn full_era_scenario_commit_reveal_then_next_era() {
    let (mut node, net) = solo_node();

    // Era 5 COMMIT phase, no prior commitment: one commit broadcast.
    node.tick_at(commit_slot(Era(5))).unwrap();
    assert_eq!(node.commitment_era(), Some(Era(5)));

    // Era 5 REVEAL phase: one reveal referencing it, state cleared.
    node.tick_at(reveal_slot(Era(5))).unwrap();
    assert_eq!(node.commitment_era(), None);

    // Era 6 COMMIT phase: a fresh commit succeeds.
    node.tick_at(commit_slot(Era(6))).unwrap();
    assert_eq!(node.commitment_era(), Some(Era(6)));

    let kinds: Vec<&'static str> = net
        .transactions()
        .iter()
        .map(|raw| Transaction::decode(raw).unwrap().kind())
        .collect();
    assert_eq!(kinds, vec!["commit_random", "reveal_random", "commit_random"]);
}

#[test]
fn other_phase_sends_no_beacon_traffic() {
    let (mut node, net) = solo_node();
    // Last slot of an era is outside both beacon windows.
    let slot = SlotNumber(clock::era_start(Era(5)).0 + SLOTS_PER_ERA - 1);
    node.tick_at(slot).unwrap();
    assert!(net.transactions().is_empty());
}

// ── Block message handler ───────────────────────────────────────────────

#[test]
fn invalid_block_signature_reports_expected_leader_once() {
    let net = Arc::new(RecordingNetwork::default());
    let leader_kp = SigningKeypair::generate();
    let receiver_kp = SigningKeypair::generate();
    let validators = vec![leader_kp.public.clone(), receiver_kp.public.clone()];
    let dag = Dag::new(0, validators.clone());
    let slot = leader_slot(&dag, &leader_kp.public, 0..1000);

    // A key outside the registry signs a block for the leader's slot.
    let attacker = SigningKeypair::generate();
    let forged = Dag::new(0, validators).sign_and_assemble_block(slot, &attacker);
    let raw = forged.encode().unwrap();

    let mut node = Node::new(
        NodeId(1),
        receiver_kp,
        dag,
        Mempool::with_defaults(),
        Arc::clone(&net),
    );
    node.handle_block_message(NodeId(9), &raw).unwrap();

    assert!(
        !node.dag().slot_has_block(slot),
        "forged block must never reach the DAG"
    );
    let reports = net.misbehavior();
    assert_eq!(reports.len(), 1, "exactly one misbehavior report");
    assert_eq!(reports[0], leader_kp.public, "report names the expected leader");
}

#[test]
fn valid_block_is_accepted_without_reports() {
    let net = Arc::new(RecordingNetwork::default());
    let leader_kp = SigningKeypair::generate();
    let receiver_kp = SigningKeypair::generate();
    let validators = vec![leader_kp.public.clone(), receiver_kp.public.clone()];
    let dag = Dag::new(0, validators.clone());
    let slot = leader_slot(&dag, &leader_kp.public, 0..1000);

    let signed = Dag::new(0, validators).sign_and_assemble_block(slot, &leader_kp);
    let raw = signed.encode().unwrap();

    let mut node = Node::new(
        NodeId(1),
        receiver_kp,
        dag,
        Mempool::with_defaults(),
        Arc::clone(&net),
    );
    node.handle_block_message(NodeId(0), &raw).unwrap();

    assert!(node.dag().slot_has_block(slot));
    assert!(net.misbehavior().is_empty());
}

#[test]
fn undecodable_block_is_rejected_quietly() {
    let (mut node, net) = solo_node();
    node.handle_block_message(NodeId(9), &[0xde, 0xad, 0xbe, 0xef])
        .unwrap();
    assert_eq!(node.dag().block_count(), 0);
    assert!(net.misbehavior().is_empty());
}

#[test]
fn duplicate_block_for_filled_slot_is_benign() {
    let net = Arc::new(RecordingNetwork::default());
    let leader_kp = SigningKeypair::generate();
    let receiver_kp = SigningKeypair::generate();
    let validators = vec![leader_kp.public.clone(), receiver_kp.public.clone()];
    let dag = Dag::new(0, validators.clone());
    let slot = leader_slot(&dag, &leader_kp.public, 0..1000);
    let raw = Dag::new(0, validators)
        .sign_and_assemble_block(slot, &leader_kp)
        .encode()
        .unwrap();

    let mut node = Node::new(
        NodeId(1),
        receiver_kp,
        dag,
        Mempool::with_defaults(),
        Arc::clone(&net),
    );
    node.handle_block_message(NodeId(0), &raw).unwrap();
    // Re-delivery of the same block must not error or report.
    node.handle_block_message(NodeId(0), &raw).unwrap();

    assert_eq!(node.dag().block_count(), 1);
    assert!(net.misbehavior().is_empty());
}

// ── Transaction message handler ─────────────────────────────────────────

#[test]
fn reveal_updates_entropy_register_but_not_consensus_seed() {
    use std::time::{SystemTime, UNIX_EPOCH};
    use vesper::constants::SLOT_DURATION_SECS;
    use vesper::crypto::beacon;
    use vesper::transaction::RevealRandomTransaction;

    // Pin the wall clock inside era 5's REVEAL window: the transaction
    // handler checks the reveal against the current phase.
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let slot = reveal_slot(Era(5));
    let genesis = now - slot.0 * SLOT_DURATION_SECS;

    let net = Arc::new(RecordingNetwork::default());
    let kp = SigningKeypair::generate();
    let mut dag = Dag::new(genesis, vec![kp.public.clone()]);

    // A commitment this node observed during era 5's COMMIT window.
    let seed = dag.era_seed_hash(Era(5));
    let (encrypted_share, reveal_key) = beacon::split_secret(&seed);
    let commit = Transaction::CommitRandom(CommitRandomTransaction { encrypted_share });
    dag.register_commit(commit.tx_id().0, Era(5));
    let mut mempool = Mempool::with_defaults();
    mempool.admit(commit.clone()).unwrap();

    let mut node = Node::new(NodeId(0), kp, dag, mempool, Arc::clone(&net));
    let seed_before = node.dag().era_seed_hash(Era(6));

    let reveal = Transaction::RevealRandom(RevealRandomTransaction {
        commit_reference: commit.tx_id().0,
        key: reveal_key.as_bytes().to_vec(),
    });
    let raw_reveal = reveal.encode().unwrap();
    node.handle_transaction_message(NodeId(9), &raw_reveal).unwrap();

    let register = node.dag().era_randomness(Era(5));
    assert!(register.is_some(), "recovered share must land in the register");
    assert_eq!(
        node.dag().era_seed_hash(Era(6)),
        seed_before,
        "observed reveals must not move the consensus seed"
    );
    assert_eq!(node.mempool().len(), 2, "reveal joins the commit in the pool");

    // Replay: the duplicate is dropped before the register is touched
    // again (an XOR re-fold would cancel the entropy).
    node.handle_transaction_message(NodeId(9), &raw_reveal).unwrap();
    assert_eq!(node.dag().era_randomness(Era(5)), register);
    assert_eq!(node.mempool().len(), 2);
}

#[test]
fn invalid_transaction_leaves_mempool_unchanged() {
    let (mut node, _net) = solo_node();

    // Malformed share length: rejected regardless of the current phase.
    let malformed = Transaction::CommitRandom(CommitRandomTransaction {
        encrypted_share: vec![0u8; 5],
    });
    let raw = malformed.encode().unwrap();
    node.handle_transaction_message(NodeId(9), &raw).unwrap();
    assert!(node.mempool().is_empty());

    // Undecodable bytes: same outcome, no panic.
    node.handle_transaction_message(NodeId(9), &[0xff; 16]).unwrap();
    assert!(node.mempool().is_empty());
}

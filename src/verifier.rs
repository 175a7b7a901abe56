//! Semantic transaction validation against current chain state.
//!
//! Admission policy for the two beacon transaction kinds:
//! - a commitment must arrive during a COMMIT window and carry a
//!   well-formed encrypted share;
//! - a reveal must arrive during a REVEAL window, carry a well-formed key,
//!   and reference a commitment transaction this node has observed.
//!
//! An invalid transaction is dropped by the caller; no misbehavior is
//! reported for transactions.

use crate::clock::EpochPhase;
use crate::constants::{REVEAL_KEY_BYTES, SHARE_BYTES, SHARE_TAG_BYTES};
use crate::dag::Dag;
use crate::transaction::Transaction;

/// Why a transaction was refused admission.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TxRejection {
    #[error("encrypted share must be {expected} bytes, got {got}")]
    MalformedShare { expected: usize, got: usize },
    #[error("reveal key must be {REVEAL_KEY_BYTES} bytes, got {0}")]
    MalformedKey(usize),
    #[error("commitment received outside a COMMIT window")]
    CommitOutsideWindow,
    #[error("reveal received outside a REVEAL window")]
    RevealOutsideWindow,
    #[error("reveal references unknown commitment {}", hex::encode(&.0[..8]))]
    UnknownCommitReference(crate::Hash),
}

/// Validates transactions against current DAG state.
pub struct TransactionVerifier<'a> {
    dag: &'a Dag,
}

impl<'a> TransactionVerifier<'a> {
    pub fn new(dag: &'a Dag) -> Self {
        TransactionVerifier { dag }
    }

    /// Validate a transaction, returning the rejection reason on failure.
    pub fn check(&self, tx: &Transaction) -> Result<(), TxRejection> {
        match tx {
            Transaction::CommitRandom(commit) => {
                let expected = SHARE_BYTES + SHARE_TAG_BYTES;
                if commit.encrypted_share.len() != expected {
                    return Err(TxRejection::MalformedShare {
                        expected,
                        got: commit.encrypted_share.len(),
                    });
                }
                if self.dag.current_phase() != EpochPhase::Commit {
                    return Err(TxRejection::CommitOutsideWindow);
                }
                Ok(())
            }
            Transaction::RevealRandom(reveal) => {
                if reveal.key.len() != REVEAL_KEY_BYTES {
                    return Err(TxRejection::MalformedKey(reveal.key.len()));
                }
                if self.dag.current_phase() != EpochPhase::Reveal {
                    return Err(TxRejection::RevealOutsideWindow);
                }
                if self.dag.commit_era(&reveal.commit_reference).is_none() {
                    return Err(TxRejection::UnknownCommitReference(reveal.commit_reference));
                }
                Ok(())
            }
        }
    }

    /// Boolean form of [`check`](Self::check).
    pub fn is_valid(&self, tx: &Transaction) -> bool {
        self.check(tx).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{self, Era, SlotNumber};
    use crate::crypto::keys::SigningKeypair;
    use crate::transaction::{CommitRandomTransaction, RevealRandomTransaction};
    use std::time::{SystemTime, UNIX_EPOCH};

    /// A dag whose wall-clock slot currently sits at `slot`.
    fn dag_at_slot(slot: SlotNumber) -> Dag {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let genesis = now - slot.0 * crate::constants::SLOT_DURATION_SECS;
        let kp = SigningKeypair::generate();
        Dag::new(genesis, vec![kp.public.clone()])
    }

    fn commit_slot() -> SlotNumber {
        clock::era_start(Era(5))
    }

    fn reveal_slot() -> SlotNumber {
        SlotNumber(clock::era_start(Era(5)).0 + crate::constants::COMMIT_WINDOW_SLOTS)
    }

    fn valid_commit() -> Transaction {
        let seed = crate::hash_domain(b"vesper.test", b"seed");
        let (encrypted_share, _key) = crate::crypto::beacon::split_secret(&seed);
        Transaction::CommitRandom(CommitRandomTransaction { encrypted_share })
    }

    #[test]
    fn accepts_well_formed_commit_in_window() {
        let dag = dag_at_slot(commit_slot());
        let verifier = TransactionVerifier::new(&dag);
        assert!(verifier.is_valid(&valid_commit()));
    }

    #[test]
    fn rejects_commit_outside_window() {
        let dag = dag_at_slot(reveal_slot());
        let verifier = TransactionVerifier::new(&dag);
        assert!(matches!(
            verifier.check(&valid_commit()),
            Err(TxRejection::CommitOutsideWindow)
        ));
    }

    #[test]
    fn rejects_malformed_share() {
        let dag = dag_at_slot(commit_slot());
        let verifier = TransactionVerifier::new(&dag);
        let tx = Transaction::CommitRandom(CommitRandomTransaction {
            encrypted_share: vec![0; 5],
        });
        assert!(matches!(
            verifier.check(&tx),
            Err(TxRejection::MalformedShare { got: 5, .. })
        ));
    }

    #[test]
    fn rejects_reveal_with_unknown_reference() {
        let dag = dag_at_slot(reveal_slot());
        let verifier = TransactionVerifier::new(&dag);
        let tx = Transaction::RevealRandom(RevealRandomTransaction {
            commit_reference: [7u8; 32],
            key: vec![0; REVEAL_KEY_BYTES],
        });
        assert!(matches!(
            verifier.check(&tx),
            Err(TxRejection::UnknownCommitReference(_))
        ));
    }

    #[test]
    fn accepts_reveal_referencing_known_commit() {
        let mut dag = dag_at_slot(reveal_slot());
        let commit = valid_commit();
        dag.register_commit(commit.tx_id().0, Era(5));
        let verifier = TransactionVerifier::new(&dag);
        let tx = Transaction::RevealRandom(RevealRandomTransaction {
            commit_reference: commit.tx_id().0,
            key: vec![0; REVEAL_KEY_BYTES],
        });
        assert!(verifier.is_valid(&tx));
    }

    #[test]
    fn rejects_reveal_outside_window() {
        let dag = dag_at_slot(commit_slot());
        let verifier = TransactionVerifier::new(&dag);
        let tx = Transaction::RevealRandom(RevealRandomTransaction {
            commit_reference: [7u8; 32],
            key: vec![0; REVEAL_KEY_BYTES],
        });
        assert!(matches!(
            verifier.check(&tx),
            Err(TxRejection::RevealOutsideWindow)
        ));
    }

    #[test]
    fn rejects_malformed_key() {
        let dag = dag_at_slot(reveal_slot());
        let verifier = TransactionVerifier::new(&dag);
        let tx = Transaction::RevealRandom(RevealRandomTransaction {
            commit_reference: [7u8; 32],
            key: vec![0; 3],
        });
        assert!(matches!(
            verifier.check(&tx),
            Err(TxRejection::MalformedKey(3))
        ));
    }
}

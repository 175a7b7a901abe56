//! Transaction mempool: admitted, verifier-approved transactions awaiting
//! inclusion.
//!
//! Semantic validation happens before admission (see
//! [`TransactionVerifier`](crate::verifier::TransactionVerifier)); the pool
//! itself only enforces uniqueness and a capacity bound with oldest-first
//! eviction.

use std::collections::{HashMap, VecDeque};

use crate::transaction::{Transaction, TxId};

/// Errors from mempool operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum MempoolError {
    #[error("transaction already in mempool")]
    Duplicate,
}

/// Configuration for the mempool.
#[derive(Clone, Debug)]
pub struct MempoolConfig {
    pub max_transactions: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        MempoolConfig {
            max_transactions: crate::constants::MEMPOOL_MAX_TXS,
        }
    }
}

/// Summary statistics for diagnostics.
#[derive(Clone, Debug, serde::Serialize)]
pub struct MempoolStats {
    pub transaction_count: usize,
    pub max_transactions: usize,
}

/// The transaction pool.
pub struct Mempool {
    config: MempoolConfig,
    /// All admitted transactions by TxId.
    txs: HashMap<TxId, Transaction>,
    /// Admission order, oldest first (for eviction).
    order: VecDeque<TxId>,
}

impl Mempool {
    /// Create a new mempool with the given configuration.
    pub fn new(config: MempoolConfig) -> Self {
        Mempool {
            config,
            txs: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Create a mempool with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MempoolConfig::default())
    }

    /// Admit a transaction.
    ///
    /// Duplicates are rejected. At capacity the oldest admitted transaction
    /// is evicted to make room.
    pub fn admit(&mut self, tx: Transaction) -> Result<TxId, MempoolError> {
        let tx_id = tx.tx_id();
        if self.txs.contains_key(&tx_id) {
            return Err(MempoolError::Duplicate);
        }

        if self.txs.len() >= self.config.max_transactions {
            if let Some(oldest) = self.order.pop_front() {
                self.txs.remove(&oldest);
            }
        }

        self.order.push_back(tx_id);
        self.txs.insert(tx_id, tx);
        Ok(tx_id)
    }

    /// Check whether a transaction is in the pool.
    pub fn contains(&self, tx_id: &TxId) -> bool {
        self.txs.contains_key(tx_id)
    }

    /// Get a transaction by TxId without removing it.
    pub fn get(&self, tx_id: &TxId) -> Option<&Transaction> {
        self.txs.get(tx_id)
    }

    /// Current number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Stats for diagnostics.
    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            transaction_count: self.txs.len(),
            max_transactions: self.config.max_transactions,
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::with_defaults()
    }
}

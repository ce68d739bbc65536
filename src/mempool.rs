//! FIFO pool of accepted-but-unconfirmed standard transactions.
//!
//! Transactions enter after validating against the current unspent-output
//! snapshot and leave when a block confirms them, when their inputs are
//! spent elsewhere, or when the snapshot they depend on disappears.

use std::collections::VecDeque;

use crate::config::TransactionConfig;
use crate::crypto::Digest;
use crate::transaction::{Transaction, TransactionError, TxType};
use crate::utxo::UtxoSet;

/// Errors from mempool admission.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum MempoolError {
    #[error("transaction shares an input with a pooled transaction")]
    DuplicateInput,
    #[error("invalid transaction: {0}")]
    Invalid(#[from] TransactionError),
}

/// FIFO queue of pending standard transactions.
#[derive(Clone, Debug, Default)]
pub struct Mempool {
    queue: VecDeque<Transaction>,
}

impl Mempool {
    /// Admit a transaction.
    ///
    /// Rejects rewards, transactions spending an outpoint already claimed by
    /// a pooled transaction (a linear scan per input; the pool is bounded by
    /// what blocks can drain), and transactions invalid against `utxos`.
    pub fn add(
        &mut self,
        tx: Transaction,
        utxos: &UtxoSet,
        config: &TransactionConfig,
    ) -> Result<(), MempoolError> {
        if tx.tx_type != TxType::Standard {
            return Err(MempoolError::Invalid(TransactionError::UnexpectedReward));
        }

        if self.queue.iter().any(|pooled| pooled.shares_input_with(&tx)) {
            return Err(MempoolError::DuplicateInput);
        }

        tx.valid(utxos, config)?;

        self.queue.push_back(tx);
        Ok(())
    }

    /// Pop the oldest pooled transaction.
    pub fn next(&mut self) -> Option<Transaction> {
        self.queue.pop_front()
    }

    /// Pop up to `n` transactions in arrival order.
    pub fn take(&mut self, n: usize) -> Vec<Transaction> {
        let n = n.min(self.queue.len());
        self.queue.drain(..n).collect()
    }

    /// Remove the pooled transaction with the given hash.
    pub fn remove(&mut self, hash: &Digest) -> Option<Transaction> {
        let pos = self.queue.iter().position(|tx| tx.hash == *hash)?;
        self.queue.remove(pos)
    }

    /// Drop every transaction at least one of whose inputs is no longer
    /// unspent. Returns the number removed.
    pub fn prune(&mut self, utxos: &UtxoSet) -> usize {
        let before = self.queue.len();
        self.queue
            .retain(|tx| tx.inputs.iter().all(|input| utxos.contains(input)));
        before - self.queue.len()
    }

    pub fn contains(&self, hash: &Digest) -> bool {
        self.queue.iter().any(|tx| tx.hash == *hash)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.queue.iter()
    }

    /// The most recently admitted transaction.
    pub fn latest(&self) -> Option<&Transaction> {
        self.queue.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::transaction::TxOutput;

    fn config() -> TransactionConfig {
        TransactionConfig {
            num_per_block: 10,
            reward_amount: 10,
        }
    }

    /// One confirmed reward output per call, spendable by `keypair`.
    fn fund(utxos: &mut UtxoSet, keypair: &Keypair, index: u64) -> Digest {
        let reward = Transaction::reward(index, &keypair.address(), 10);
        utxos.apply(&reward);
        reward.hash
    }

    fn spend(keypair: &Keypair, outpoint: Digest, to: &str) -> Transaction {
        let mut tx = Transaction::standard(
            1,
            vec![(outpoint, 0)],
            vec![TxOutput {
                amount: 10,
                address: to.to_string(),
            }],
        );
        tx.sign(&keypair.private);
        tx
    }

    #[test]
    fn fifo_order() {
        let kp = Keypair::generate();
        let mut utxos = UtxoSet::default();
        let a = fund(&mut utxos, &kp, 0);
        let b = fund(&mut utxos, &kp, 1);

        let mut pool = Mempool::default();
        let tx_a = spend(&kp, a, "first");
        let tx_b = spend(&kp, b, "second");
        pool.add(tx_a.clone(), &utxos, &config()).unwrap();
        pool.add(tx_b.clone(), &utxos, &config()).unwrap();

        assert_eq!(pool.latest(), Some(&tx_b));
        assert_eq!(pool.next(), Some(tx_a));
        assert_eq!(pool.next(), Some(tx_b));
        assert_eq!(pool.next(), None);
    }

    #[test]
    fn duplicate_input_rejected() {
        let kp = Keypair::generate();
        let mut utxos = UtxoSet::default();
        let outpoint = fund(&mut utxos, &kp, 0);

        let mut pool = Mempool::default();
        pool.add(spend(&kp, outpoint, "one"), &utxos, &config())
            .unwrap();
        let err = pool
            .add(spend(&kp, outpoint, "two"), &utxos, &config())
            .unwrap_err();
        assert_eq!(err, MempoolError::DuplicateInput);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn invalid_transaction_rejected() {
        let kp = Keypair::generate();
        let utxos = UtxoSet::default();
        let mut pool = Mempool::default();

        let err = pool
            .add(spend(&kp, crate::crypto::sha256(b"void"), "x"), &utxos, &config())
            .unwrap_err();
        assert_eq!(
            err,
            MempoolError::Invalid(TransactionError::UnknownInput(0))
        );
        assert!(pool.is_empty());
    }

    #[test]
    fn rewards_never_pooled() {
        let utxos = UtxoSet::default();
        let mut pool = Mempool::default();
        let err = pool
            .add(Transaction::reward(0, "addr", 10), &utxos, &config())
            .unwrap_err();
        assert!(matches!(err, MempoolError::Invalid(_)));
    }

    #[test]
    fn remove_by_hash() {
        let kp = Keypair::generate();
        let mut utxos = UtxoSet::default();
        let outpoint = fund(&mut utxos, &kp, 0);

        let mut pool = Mempool::default();
        let tx = spend(&kp, outpoint, "x");
        let hash = tx.hash;
        pool.add(tx, &utxos, &config()).unwrap();

        assert!(pool.contains(&hash));
        assert!(pool.remove(&hash).is_some());
        assert!(pool.remove(&hash).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn prune_drops_transactions_with_spent_inputs() {
        let kp = Keypair::generate();
        let mut utxos = UtxoSet::default();
        let a = fund(&mut utxos, &kp, 0);
        let b = fund(&mut utxos, &kp, 1);

        let mut pool = Mempool::default();
        let tx_a = spend(&kp, a, "one");
        pool.add(tx_a.clone(), &utxos, &config()).unwrap();
        pool.add(spend(&kp, b, "two"), &utxos, &config()).unwrap();

        // Confirm tx_a: its input disappears from the unspent set.
        utxos.apply(&tx_a);
        assert_eq!(pool.prune(&utxos), 1);
        assert_eq!(pool.len(), 1);
        assert!(!pool.contains(&tx_a.hash));
    }

    #[test]
    fn take_drains_in_order() {
        let kp = Keypair::generate();
        let mut utxos = UtxoSet::default();
        let mut hashes = Vec::new();
        let mut pool = Mempool::default();
        for i in 0..3 {
            let outpoint = fund(&mut utxos, &kp, i);
            let tx = spend(&kp, outpoint, "x");
            hashes.push(tx.hash);
            pool.add(tx, &utxos, &config()).unwrap();
        }

        let taken = pool.take(2);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].hash, hashes[0]);
        assert_eq!(taken[1].hash, hashes[1]);
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.take(5).len(), 1);
        assert!(pool.is_empty());
    }
}

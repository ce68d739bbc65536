//! The unspent-transaction-output ledger.
//!
//! Keyed by `(output_hash, output_index)`; mutated only by committing a
//! validated block, so callers validate a whole transaction list against the
//! pre-block snapshot before any entry is applied.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::crypto::Digest;
use crate::transaction::{Transaction, TransactionList, TxInput, TxOutput};

/// An unspent output record as exposed on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub output_hash: Digest,
    pub output_index: u32,
    pub output: TxOutput,
}

/// The set of unspent outputs, keyed by outpoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UtxoSet {
    entries: HashMap<(Digest, u32), TxOutput>,
}

impl UtxoSet {
    /// Look up the output referenced by an outpoint.
    pub fn get(&self, output_hash: &Digest, output_index: u32) -> Option<&TxOutput> {
        self.entries.get(&(*output_hash, output_index))
    }

    /// Whether the referenced outpoint is unspent.
    pub fn contains(&self, input: &TxInput) -> bool {
        self.entries
            .contains_key(&(input.output_hash, input.output_index))
    }

    /// Apply one validated transaction: consume its inputs, then record its
    /// outputs under `(tx.hash, output_index)`.
    pub fn apply(&mut self, tx: &Transaction) {
        for input in &tx.inputs {
            self.entries.remove(&(input.output_hash, input.output_index));
        }
        for (i, output) in tx.outputs.iter().enumerate() {
            self.entries.insert((tx.hash, i as u32), output.clone());
        }
    }

    /// Apply a validated transaction list in order.
    pub fn apply_list(&mut self, list: &TransactionList) {
        for tx in list.iter() {
            self.apply(tx);
        }
    }

    /// Total unspent amount.
    pub fn sum(&self) -> u64 {
        self.entries.values().map(|o| o.amount).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All unspent outputs, sorted by outpoint for deterministic output.
    pub fn to_list(&self) -> Vec<Utxo> {
        let mut list: Vec<Utxo> = self
            .entries
            .iter()
            .map(|(&(output_hash, output_index), output)| Utxo {
                output_hash,
                output_index,
                output: output.clone(),
            })
            .collect();
        list.sort_by(|a, b| {
            (a.output_hash, a.output_index).cmp(&(b.output_hash, b.output_index))
        });
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TxOutput;

    fn output(amount: u64) -> TxOutput {
        TxOutput {
            amount,
            address: "addr".into(),
        }
    }

    #[test]
    fn apply_records_outputs_and_consumes_inputs() {
        let reward = Transaction::reward(0, "addr", 10);
        let mut utxos = UtxoSet::default();
        utxos.apply(&reward);

        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos.get(&reward.hash, 0), Some(&output(10)));
        assert_eq!(utxos.sum(), 10);

        let spend = Transaction::standard(1, vec![(reward.hash, 0)], vec![output(10)]);
        utxos.apply(&spend);

        assert_eq!(utxos.len(), 1);
        assert!(utxos.get(&reward.hash, 0).is_none());
        assert_eq!(utxos.get(&spend.hash, 0), Some(&output(10)));
        assert_eq!(utxos.sum(), 10);
    }

    #[test]
    fn multiple_outputs_indexed_in_order() {
        let split = Transaction::standard(0, vec![], vec![output(3), output(7)]);
        let mut utxos = UtxoSet::default();
        utxos.apply(&split);

        assert_eq!(utxos.get(&split.hash, 0).unwrap().amount, 3);
        assert_eq!(utxos.get(&split.hash, 1).unwrap().amount, 7);
        assert_eq!(utxos.sum(), 10);
    }

    #[test]
    fn to_list_is_sorted_and_complete() {
        let a = Transaction::reward(0, "a", 10);
        let b = Transaction::reward(1, "b", 10);
        let mut utxos = UtxoSet::default();
        utxos.apply(&a);
        utxos.apply(&b);

        let list = utxos.to_list();
        assert_eq!(list.len(), 2);
        assert!(list[0].output_hash <= list[1].output_hash);
    }
}

//! Value-transfer records: transaction inputs, outputs, and block payload
//! lists.
//!
//! A transaction's hash covers its index, its inputs' outpoints, and its
//! outputs — signatures are excluded so that each input can sign the hash.
//! Wallets construct and sign transactions externally; the node only
//! validates them against its unspent-output ledger.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::config::TransactionConfig;
use crate::crypto::{sha256, CryptoError, Digest, PrivateKey, PublicKey, Signature};
use crate::utxo::UtxoSet;

/// Errors from transaction and transaction-list validation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TransactionError {
    #[error("hash does not match transaction contents")]
    HashMismatch,
    #[error("input {0} does not reference an unspent output")]
    UnknownInput(usize),
    #[error("input {0} signature verification failed")]
    InvalidSignature(usize),
    #[error("input amounts do not equal output amounts")]
    AmountMismatch,
    #[error("malformed reward transaction")]
    InvalidReward,
    #[error("transaction index {found} does not match block index {expected}")]
    IndexMismatch { expected: u64, found: u64 },
    #[error("transaction list is empty")]
    EmptyList,
    #[error("transaction list exceeds {0} entries")]
    ListTooLarge(usize),
    #[error("first transaction must be the reward transaction")]
    MissingReward,
    #[error("only the first transaction may be a reward")]
    UnexpectedReward,
    #[error("two transactions spend the same output")]
    DuplicateSpend,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Transaction kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Standard,
    Reward,
}

/// Transaction input: a reference to the unspent output being consumed plus
/// a signature over the enclosing transaction's hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    pub output_hash: Digest,
    pub output_index: u32,
    pub signature: Signature,
}

/// Transaction output: an amount sent to an address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub address: String,
}

/// A value transfer, hashed over everything except input signatures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub index: u64,
    pub hash: Digest,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// The reward transaction for the block at `index`, paying `amount` to
    /// `address`. Ready to commit as the first entry of a transaction list.
    pub fn reward(index: u64, address: &str, amount: u64) -> Self {
        let mut tx = Transaction {
            tx_type: TxType::Reward,
            index,
            hash: Digest::default(),
            inputs: Vec::new(),
            outputs: vec![TxOutput {
                amount,
                address: address.to_string(),
            }],
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// A standard transaction spending the given outpoints. Input signatures
    /// start empty; call [`Transaction::sign`] before submitting.
    pub fn standard(index: u64, outpoints: Vec<(Digest, u32)>, outputs: Vec<TxOutput>) -> Self {
        let inputs = outpoints
            .into_iter()
            .map(|(output_hash, output_index)| TxInput {
                output_hash,
                output_index,
                signature: Signature::empty(),
            })
            .collect();
        let mut tx = Transaction {
            tx_type: TxType::Standard,
            index,
            hash: Digest::default(),
            inputs,
            outputs,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Sign every input with `key`. All referenced outputs must belong to
    /// the corresponding address for validation to pass later.
    pub fn sign(&mut self, key: &PrivateKey) {
        let signature = key.sign(&self.hash);
        for input in &mut self.inputs {
            input.signature = signature.clone();
        }
    }

    /// Deterministic hash over `(index, inputs[*].outpoint, outputs[*])`,
    /// excluding signatures.
    pub fn compute_hash(&self) -> Digest {
        let mut preimage = String::new();

        let _ = write!(preimage, "{}", self.index);

        for input in &self.inputs {
            preimage.push_str(&input.output_hash.to_hex());
            let _ = write!(preimage, "{}", input.output_index);
        }

        for output in &self.outputs {
            let _ = write!(preimage, "{}", output.amount);
            preimage.push_str(&output.address);
        }

        sha256(preimage.as_bytes())
    }

    /// Validate either kind of transaction against the current unspent-output
    /// snapshot.
    pub fn valid(
        &self,
        utxos: &UtxoSet,
        config: &TransactionConfig,
    ) -> Result<(), TransactionError> {
        match self.tx_type {
            TxType::Standard => self.valid_standard(utxos),
            TxType::Reward => self.valid_reward(config.reward_amount),
        }
    }

    /// Reward validity: no inputs, exactly one output of the configured
    /// amount, and a consistent hash.
    pub fn valid_reward(&self, reward_amount: u64) -> Result<(), TransactionError> {
        if self.hash != self.compute_hash() {
            return Err(TransactionError::HashMismatch);
        }
        if !self.inputs.is_empty()
            || self.outputs.len() != 1
            || self.outputs[0].amount != reward_amount
        {
            return Err(TransactionError::InvalidReward);
        }
        Ok(())
    }

    /// Standard validity against `utxos`: hash consistency, every input
    /// references an unspent output and carries a valid signature by that
    /// output's address, and value is conserved.
    pub fn valid_standard(&self, utxos: &UtxoSet) -> Result<(), TransactionError> {
        if self.hash != self.compute_hash() {
            return Err(TransactionError::HashMismatch);
        }

        let mut input_total: u64 = 0;

        for (i, input) in self.inputs.iter().enumerate() {
            let Some(output) = utxos.get(&input.output_hash, input.output_index) else {
                return Err(TransactionError::UnknownInput(i));
            };

            let key = PublicKey::from_address(&output.address)?;
            if !key.verify(&self.hash, &input.signature)? {
                return Err(TransactionError::InvalidSignature(i));
            }

            input_total = input_total.saturating_add(output.amount);
        }

        let output_total: u64 = self
            .outputs
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.amount));

        if input_total != output_total {
            return Err(TransactionError::AmountMismatch);
        }

        Ok(())
    }

    /// Whether this transaction spends the same outpoint as `other`.
    pub fn shares_input_with(&self, other: &Transaction) -> bool {
        self.inputs.iter().any(|a| {
            other
                .inputs
                .iter()
                .any(|b| a.output_hash == b.output_hash && a.output_index == b.output_index)
        })
    }
}

/// The ordered transaction payload of one block: a reward transaction
/// followed by standard transactions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionList(pub Vec<Transaction>);

impl TransactionList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.0.iter()
    }

    /// Validate the list as the payload of the block at `block_index`,
    /// against the unspent-output snapshot taken before the block.
    ///
    /// Duplicate-spend detection is a quadratic scan; the list is bounded by
    /// `num_per_block + 1`, so the worst case is
    /// O((num_per_block · max_inputs)²).
    pub fn validate(
        &self,
        block_index: u64,
        utxos: &UtxoSet,
        config: &TransactionConfig,
    ) -> Result<(), TransactionError> {
        if self.0.is_empty() {
            return Err(TransactionError::EmptyList);
        }
        if self.0.len() > config.num_per_block + 1 {
            return Err(TransactionError::ListTooLarge(config.num_per_block + 1));
        }

        if self.0[0].tx_type != TxType::Reward {
            return Err(TransactionError::MissingReward);
        }
        if self.0[1..].iter().any(|tx| tx.tx_type != TxType::Standard) {
            return Err(TransactionError::UnexpectedReward);
        }

        for tx in &self.0 {
            if tx.index != block_index {
                return Err(TransactionError::IndexMismatch {
                    expected: block_index,
                    found: tx.index,
                });
            }
            tx.valid(utxos, config)?;
        }

        for (i, tx) in self.0.iter().enumerate() {
            if self.0[i + 1..].iter().any(|other| tx.shares_input_with(other)) {
                return Err(TransactionError::DuplicateSpend);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::utxo::UtxoSet;

    fn config() -> TransactionConfig {
        TransactionConfig {
            num_per_block: 3,
            reward_amount: 10,
        }
    }

    /// A UTXO set holding one reward output, returning its outpoint.
    fn seeded_utxos(keypair: &Keypair) -> (UtxoSet, Digest) {
        let reward = Transaction::reward(0, &keypair.address(), 10);
        let mut utxos = UtxoSet::default();
        utxos.apply(&reward);
        (utxos, reward.hash)
    }

    fn spend_to(
        keypair: &Keypair,
        outpoint: Digest,
        index: u64,
        to: &str,
        amount: u64,
    ) -> Transaction {
        let mut tx = Transaction::standard(
            index,
            vec![(outpoint, 0)],
            vec![TxOutput {
                amount,
                address: to.to_string(),
            }],
        );
        tx.sign(&keypair.private);
        tx
    }

    #[test]
    fn reward_is_valid_and_hash_consistent() {
        let tx = Transaction::reward(3, "addr", 10);
        assert_eq!(tx.hash, tx.compute_hash());
        assert!(tx.valid_reward(10).is_ok());
        assert_eq!(tx.valid_reward(50), Err(TransactionError::InvalidReward));
    }

    #[test]
    fn hash_excludes_signatures() {
        let kp = Keypair::generate();
        let (_, outpoint) = seeded_utxos(&kp);
        let mut tx = spend_to(&kp, outpoint, 1, "dest", 10);
        let before = tx.hash;
        tx.sign(&kp.private);
        assert_eq!(tx.compute_hash(), before);
    }

    #[test]
    fn signed_spend_validates() {
        let kp = Keypair::generate();
        let (utxos, outpoint) = seeded_utxos(&kp);
        let dest = Keypair::generate().address();
        let tx = spend_to(&kp, outpoint, 1, &dest, 10);
        assert!(tx.valid_standard(&utxos).is_ok());
    }

    #[test]
    fn unsigned_spend_rejected() {
        let kp = Keypair::generate();
        let (utxos, outpoint) = seeded_utxos(&kp);
        let tx = Transaction::standard(
            1,
            vec![(outpoint, 0)],
            vec![TxOutput {
                amount: 10,
                address: "dest".into(),
            }],
        );
        assert_eq!(
            tx.valid_standard(&utxos),
            Err(TransactionError::InvalidSignature(0))
        );
    }

    #[test]
    fn foreign_signature_rejected() {
        let kp = Keypair::generate();
        let intruder = Keypair::generate();
        let (utxos, outpoint) = seeded_utxos(&kp);
        let mut tx = Transaction::standard(
            1,
            vec![(outpoint, 0)],
            vec![TxOutput {
                amount: 10,
                address: "dest".into(),
            }],
        );
        tx.sign(&intruder.private);
        assert_eq!(
            tx.valid_standard(&utxos),
            Err(TransactionError::InvalidSignature(0))
        );
    }

    #[test]
    fn unknown_input_rejected() {
        let kp = Keypair::generate();
        let utxos = UtxoSet::default();
        let tx = spend_to(&kp, sha256(b"missing"), 1, "dest", 10);
        assert_eq!(
            tx.valid_standard(&utxos),
            Err(TransactionError::UnknownInput(0))
        );
    }

    #[test]
    fn unbalanced_amounts_rejected() {
        let kp = Keypair::generate();
        let (utxos, outpoint) = seeded_utxos(&kp);
        let tx = spend_to(&kp, outpoint, 1, "dest", 7);
        assert_eq!(
            tx.valid_standard(&utxos),
            Err(TransactionError::AmountMismatch)
        );
    }

    #[test]
    fn tampered_hash_rejected() {
        let kp = Keypair::generate();
        let (utxos, outpoint) = seeded_utxos(&kp);
        let mut tx = spend_to(&kp, outpoint, 1, "dest", 10);
        tx.outputs[0].amount = 9;
        assert_eq!(
            tx.valid_standard(&utxos),
            Err(TransactionError::HashMismatch)
        );
    }

    #[test]
    fn list_rules() {
        let kp = Keypair::generate();
        let (utxos, outpoint) = seeded_utxos(&kp);
        let dest = Keypair::generate().address();

        let reward = Transaction::reward(1, &kp.address(), 10);
        let spend = spend_to(&kp, outpoint, 1, &dest, 10);

        let list = TransactionList(vec![reward.clone(), spend.clone()]);
        assert!(list.validate(1, &utxos, &config()).is_ok());

        // Reward must come first.
        let list = TransactionList(vec![spend.clone(), reward.clone()]);
        assert_eq!(
            list.validate(1, &utxos, &config()),
            Err(TransactionError::MissingReward)
        );

        // All entries carry the block index.
        let list = TransactionList(vec![Transaction::reward(2, &kp.address(), 10)]);
        assert_eq!(
            list.validate(1, &utxos, &config()),
            Err(TransactionError::IndexMismatch {
                expected: 1,
                found: 2
            })
        );

        // Empty payloads are rejected.
        let list = TransactionList(vec![]);
        assert_eq!(
            list.validate(1, &utxos, &config()),
            Err(TransactionError::EmptyList)
        );
    }

    #[test]
    fn list_size_bound() {
        let kp = Keypair::generate();
        let utxos = UtxoSet::default();
        let mut txs = vec![Transaction::reward(0, &kp.address(), 10)];
        // num_per_block = 3 allows 4 entries; a 5th must be rejected before
        // the per-transaction checks run.
        for _ in 0..4 {
            txs.push(Transaction::standard(0, vec![], vec![]));
        }
        let list = TransactionList(txs);
        assert_eq!(
            list.validate(0, &utxos, &config()),
            Err(TransactionError::ListTooLarge(4))
        );
    }

    #[test]
    fn double_spend_within_list_rejected() {
        let kp = Keypair::generate();
        let (utxos, outpoint) = seeded_utxos(&kp);
        let dest = Keypair::generate().address();

        let reward = Transaction::reward(1, &kp.address(), 10);
        let spend_a = spend_to(&kp, outpoint, 1, &dest, 10);
        let spend_b = spend_to(&kp, outpoint, 1, &kp.address(), 10);

        let list = TransactionList(vec![reward, spend_a, spend_b]);
        assert_eq!(
            list.validate(1, &utxos, &config()),
            Err(TransactionError::DuplicateSpend)
        );
    }

    #[test]
    fn json_roundtrip_with_wire_field_names() {
        let kp = Keypair::generate();
        let (_, outpoint) = seeded_utxos(&kp);
        let mut tx = spend_to(&kp, outpoint, 2, "dest", 10);
        tx.sign(&kp.private);

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "standard");
        assert_eq!(json["index"], 2);
        assert!(json["inputs"][0]["output_hash"].is_string());
        assert!(json["inputs"][0]["output_index"].is_number());
        assert!(json["inputs"][0]["signature"].is_string());
        assert_eq!(json["outputs"][0]["amount"], 10);
        assert_eq!(json["outputs"][0]["address"], "dest");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}

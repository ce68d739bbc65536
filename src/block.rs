//! Blocks: hashed, linked, optionally proof-of-work-sealed chain entries.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::clock::{self, Timestamp};
use crate::config::ChainConfig;
use crate::crypto::{sha256, Digest};
use crate::transaction::{TransactionError, TransactionList};
use crate::utxo::UtxoSet;

/// Errors from standalone block validation.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BlockError {
    #[error("invalid data: {0}")]
    Data(#[from] TransactionError),
    #[error("transactions are not enabled on this chain")]
    TransactionsDisabled,
    #[error("expected a transaction list payload")]
    ExpectedTransactions,
    #[error("block timestamp is too far in the future")]
    Timestamp,
    #[error("block hash does not match its contents")]
    HashMismatch,
}

/// Block payload: an opaque string on plain chains, a transaction list on
/// transaction chains. The JSON forms (string vs. array) are disjoint, so
/// the enum is untagged on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Transactions(TransactionList),
    Raw(String),
}

impl BlockData {
    /// Compact JSON form, the exact bytes hashed into the block.
    fn to_json(&self) -> String {
        serde_json::to_string(self).expect("block data serialization cannot fail")
    }

    /// The transaction list, if this is a transaction payload.
    pub fn transactions(&self) -> Option<&TransactionList> {
        match self {
            BlockData::Transactions(list) => Some(list),
            BlockData::Raw(_) => None,
        }
    }
}

/// One chain entry. `hash` covers the payload, timestamp, nonce, index, and
/// the previous block's hash; `hash_prev` is absent only on the genesis
/// block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub data: BlockData,
    pub timestamp: Timestamp,
    pub nonce: u64,
    pub index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_prev: Option<Digest>,
    pub hash: Digest,
}

impl Block {
    /// A fresh genesis block for the given payload.
    pub fn genesis(data: BlockData) -> Self {
        let mut block = Block {
            data,
            timestamp: clock::now(),
            nonce: 0,
            index: 0,
            hash_prev: None,
            hash: Digest::default(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// A fresh block linked to `last`.
    pub fn next(data: BlockData, last: &Block) -> Self {
        let mut block = Block {
            data,
            timestamp: clock::now(),
            nonce: 0,
            index: last.index + 1,
            hash_prev: Some(last.hash),
            hash: Digest::default(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Recompute the hash over the block's contents.
    pub fn compute_hash(&self) -> Digest {
        let mut preimage = self.data.to_json();

        let _ = write!(preimage, "{}", self.timestamp);
        let _ = write!(preimage, "{}", self.nonce);
        let _ = write!(preimage, "{}", self.index);

        if let Some(hash_prev) = &self.hash_prev {
            preimage.push_str(&hash_prev.to_hex());
        }

        sha256(preimage.as_bytes())
    }

    /// Standalone validity: payload validity against the unspent-output
    /// snapshot, a timestamp no further than the tolerated skew into the
    /// future, and a consistent hash.
    pub fn validate(&self, utxos: &UtxoSet, config: &ChainConfig) -> Result<(), BlockError> {
        match (&self.data, &config.transaction) {
            (BlockData::Raw(_), None) => {}
            (BlockData::Raw(_), Some(_)) => return Err(BlockError::ExpectedTransactions),
            (BlockData::Transactions(_), None) => return Err(BlockError::TransactionsDisabled),
            (BlockData::Transactions(list), Some(tx_config)) => {
                list.validate(self.index, utxos, tx_config)?;
            }
        }

        if self.timestamp > clock::now().saturating_add(config.block_gen.time_max_delta) {
            return Err(BlockError::Timestamp);
        }

        if self.hash != self.compute_hash() {
            return Err(BlockError::HashMismatch);
        }

        Ok(())
    }

    /// Whether this block can start a chain.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.hash_prev.is_none()
    }

    /// Whether this block directly extends `prev`: consecutive index,
    /// matching previous-hash link, and a timestamp no older than `prev`'s
    /// minus the tolerated skew.
    pub fn is_successor_of(&self, prev: &Block, time_max_delta: u64) -> bool {
        self.index == prev.index + 1
            && self.hash_prev == Some(prev.hash)
            && self.timestamp > prev.timestamp.saturating_sub(time_max_delta)
    }

    /// Mine until the hash meets the required leading-zero-bit count. The
    /// timestamp is refreshed on every attempt, so the sealed block carries
    /// the time it was actually sealed.
    pub fn mine(&mut self, difficulty_log2: u32) {
        loop {
            self.timestamp = clock::now();

            let candidate = self.compute_hash();
            if candidate.leading_zero_bits() >= difficulty_log2 {
                self.hash = candidate;
                return;
            }

            self.nonce += 1;
        }
    }
}

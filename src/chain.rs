//! The block chain: an append-only, validated sequence of blocks together
//! with the chain-scoped state it determines — the unspent-output ledger and
//! the proof-of-work difficulty state.
//!
//! Both derived states are rebuilt deterministically by replaying the blocks
//! from genesis, which is also how whole chains received from peers are
//! validated: a chain value can only be constructed by a replay that
//! enforces every block-level and link-level rule.

use crate::block::{Block, BlockData};
use crate::config::ChainConfig;
use crate::difficulty::DifficultyAdjuster;
use crate::utxo::UtxoSet;

/// Errors from chain validation and append operations. Failed operations
/// never partially mutate the chain.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("empty blockchain")]
    Empty,
    #[error("invalid genesis block: {0}")]
    InvalidGenesis(String),
    #[error("block {index}: {reason}")]
    InvalidBlock { index: u64, reason: String },
    #[error("block {0}: not a valid successor")]
    NotSuccessor(u64),
    #[error("block does not meet the required difficulty")]
    InvalidDifficulty,
    #[error("invalid block data: {0}")]
    InvalidData(String),
    #[error("malformed chain JSON: {0}")]
    Json(String),
}

/// An owned, validated chain of blocks.
#[derive(Clone, Debug)]
pub struct Blockchain {
    config: ChainConfig,
    blocks: Vec<Block>,
    utxos: UtxoSet,
    difficulty: DifficultyAdjuster,
}

impl Blockchain {
    /// An empty chain.
    pub fn new(config: ChainConfig) -> Self {
        let difficulty = DifficultyAdjuster::new(&config.block_gen);
        Blockchain {
            config,
            blocks: Vec::new(),
            utxos: UtxoSet::default(),
            difficulty,
        }
    }

    /// Build a chain by replaying `blocks` from genesis, enforcing every
    /// append rule along the way.
    pub fn with_blocks(config: ChainConfig, blocks: Vec<Block>) -> Result<Self, ChainError> {
        let mut chain = Blockchain::new(config);
        for block in blocks {
            chain.append_next_block(block)?;
        }
        Ok(chain)
    }

    /// Parse and validate a chain from its JSON array form.
    pub fn from_json(config: ChainConfig, value: &serde_json::Value) -> Result<Self, ChainError> {
        let blocks: Vec<Block> =
            serde_json::from_value(value.clone()).map_err(|e| ChainError::Json(e.to_string()))?;
        Self::with_blocks(config, blocks)
    }

    /// The JSON array form; exactly re-loadable via [`Blockchain::from_json`].
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.blocks).expect("chain serialization cannot fail")
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// The unspent-output snapshot after the latest block.
    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    /// Required leading-zero-bit count for the next block.
    pub fn difficulty_log2(&self) -> u32 {
        self.difficulty.difficulty_log2()
    }

    /// Chain comparator under proof-of-work.
    pub fn cumulative_difficulty(&self) -> f64 {
        self.difficulty.cumulative_difficulty()
    }

    /// Whether this chain strictly exceeds `other` under the configured
    /// comparison rule: cumulative difficulty under proof-of-work, length
    /// otherwise. Ties resolve in favour of the chain currently held.
    pub fn is_richer_than(&self, other: &Blockchain) -> bool {
        if self.config.proof_of_work {
            self.cumulative_difficulty() > other.cumulative_difficulty()
        } else {
            self.len() > other.len()
        }
    }

    /// Re-validate the whole chain by replaying it from genesis.
    pub fn valid(&self) -> Result<(), ChainError> {
        if self.blocks.is_empty() {
            return Err(ChainError::Empty);
        }
        Self::with_blocks(self.config.clone(), self.blocks.clone()).map(|_| ())
    }

    /// Build, seal, and commit the next block for `data`.
    ///
    /// The payload is validated against the current unspent-output snapshot
    /// first; under proof-of-work the block is mined to the target in force
    /// after feeding its timestamp to the difficulty controller.
    pub fn construct_next_block(&mut self, data: BlockData) -> Result<&Block, ChainError> {
        let mut block = match self.blocks.last() {
            None => Block::genesis(data),
            Some(last) => Block::next(data, last),
        };

        block
            .validate(&self.utxos, &self.config)
            .map_err(|e| ChainError::InvalidData(e.to_string()))?;

        self.difficulty.adjust(block.timestamp);

        if self.config.proof_of_work {
            block.mine(self.difficulty.difficulty_log2());
        }

        self.commit(block);
        Ok(self.blocks.last().expect("just committed"))
    }

    /// Validate and commit a block received from a peer.
    ///
    /// The proof-of-work check runs against the target in force after the
    /// block's timestamp is fed to the controller — the same target
    /// construction mines to, so a chain built by one node replays on every
    /// other. The controller state is only committed once the check passes.
    pub fn append_next_block(&mut self, block: Block) -> Result<(), ChainError> {
        match self.blocks.last() {
            None => {
                if !block.is_genesis() {
                    return Err(ChainError::InvalidGenesis(
                        "invalid index or previous hash".into(),
                    ));
                }
                block
                    .validate(&self.utxos, &self.config)
                    .map_err(|e| ChainError::InvalidGenesis(e.to_string()))?;
            }
            Some(last) => {
                if !block.is_successor_of(last, self.config.block_gen.time_max_delta) {
                    return Err(ChainError::NotSuccessor(block.index));
                }
                block
                    .validate(&self.utxos, &self.config)
                    .map_err(|e| ChainError::InvalidBlock {
                        index: block.index,
                        reason: e.to_string(),
                    })?;
            }
        }

        let mut difficulty = self.difficulty.clone();
        difficulty.adjust(block.timestamp);

        if self.config.proof_of_work
            && block.hash.leading_zero_bits() < difficulty.difficulty_log2()
        {
            return Err(ChainError::InvalidDifficulty);
        }

        self.difficulty = difficulty;
        self.commit(block);
        Ok(())
    }

    /// Append a block whose validity has been established and apply its
    /// unspent-output deltas.
    fn commit(&mut self, block: Block) {
        if let Some(list) = block.data.transactions() {
            self.utxos.apply_list(list);
        }
        self.blocks.push(block);
    }

    /// Replace this chain wholesale with an already-validated richer chain.
    pub fn replace(&mut self, other: Blockchain) {
        tracing::info!(
            old_len = self.len(),
            new_len = other.len(),
            "Replacing blockchain"
        );
        *self = other;
    }
}

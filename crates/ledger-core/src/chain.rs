//! The canonical block sequence and the longest-valid-chain rule.

use crate::constants::MIN_DIFFICULTY;
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use crate::Block;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Shared handle to the local chain.
///
/// Readers get an immutable snapshot; writers publish a new sequence under the
/// lock, so a reader never sees a partially replaced chain.
#[derive(Clone)]
pub struct Chain {
    inner: Arc<ChainInner>,
}

struct ChainInner {
    blocks: RwLock<Arc<Vec<Block>>>,
    /// Bumped on every accepted replacement.
    generation: AtomicU64,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChainInner {
                blocks: RwLock::new(Arc::new(vec![Block::genesis()])),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn blocks(&self) -> Arc<Vec<Block>> {
        self.inner
            .blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.blocks().len()
    }

    pub fn tail(&self) -> Block {
        self.blocks().last().cloned().unwrap_or_else(Block::genesis)
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Append a block that extends the current tail.
    pub fn append(&self, block: Block) -> Result<()> {
        let mut guard = self
            .inner
            .blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let tail = guard.last().cloned().unwrap_or_else(Block::genesis);
        if let Err(e) = validate_link(&tail, &block) {
            warn!(error = %e, hash = %block.hash, "rejected block");
            return Err(e);
        }
        debug!(height = guard.len(), hash = %block.hash, "appended block");
        Arc::make_mut(&mut guard).push(block);
        Ok(())
    }

    /// Mine `data` on top of the current tail and append it.
    pub fn add_block(&self, data: Vec<Transaction>) -> Result<Block> {
        let block = Block::mine(&self.tail(), data);
        self.append(block.clone())?;
        Ok(block)
    }

    /// Like [`Chain::add_block`], but abandons the search once the chain has
    /// been replaced since generation `since`.
    pub fn add_block_cancellable(&self, data: Vec<Transaction>, since: u64) -> Result<Block> {
        let tail = self.tail();
        let block = Block::mine_until(&tail, data, || self.generation() != since)
            .ok_or(LedgerError::MiningInterrupted)?;
        self.append(block.clone())?;
        Ok(block)
    }

    pub fn is_valid_chain(candidate: &[Block]) -> bool {
        Self::validate_chain(candidate).is_ok()
    }

    /// Check genesis and every link of `candidate`, naming the first failure.
    pub fn validate_chain(candidate: &[Block]) -> Result<()> {
        match candidate.first() {
            Some(first) if *first == Block::genesis() => {}
            _ => return Err(LedgerError::RejectedChain("genesis mismatch".into())),
        }
        candidate
            .par_windows(2)
            .enumerate()
            .try_for_each(|(i, pair)| {
                validate_link(&pair[0], &pair[1])
                    .map_err(|e| LedgerError::RejectedChain(format!("block {}: {e}", i + 1)))
            })
    }

    /// Adopt `candidate` if it is strictly longer and fully valid.
    /// Equal length keeps the local chain.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> Result<()> {
        let current = self.len();
        if candidate.len() <= current {
            let reason = format!(
                "received chain of length {} is not longer than current {}",
                candidate.len(),
                current
            );
            info!("{reason}");
            return Err(LedgerError::RejectedChain(reason));
        }
        if let Err(e) = Self::validate_chain(&candidate) {
            warn!(error = %e, "received chain is not valid");
            return Err(e);
        }

        let mut guard = self
            .inner
            .blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // the local chain may have grown while the candidate was validated
        if candidate.len() <= guard.len() {
            let reason = format!(
                "received chain of length {} is not longer than current {}",
                candidate.len(),
                guard.len()
            );
            info!("{reason}");
            return Err(LedgerError::RejectedChain(reason));
        }
        let length = candidate.len();
        *guard = Arc::new(candidate);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        info!(length, "replacing chain with received chain");
        Ok(())
    }
}

fn validate_link(parent: &Block, block: &Block) -> Result<()> {
    if block.last_hash != parent.hash {
        return Err(LedgerError::InvalidBlock(format!(
            "last hash {} does not match parent {}",
            block.last_hash, parent.hash
        )));
    }
    if block.hash != block.compute_hash() {
        return Err(LedgerError::InvalidBlock(format!(
            "hash {} does not match contents",
            block.hash
        )));
    }
    if !block.has_valid_proof() {
        return Err(LedgerError::InvalidBlock(format!(
            "hash {} lacks {} leading zeros",
            block.hash, block.difficulty
        )));
    }
    if block.difficulty < MIN_DIFFICULTY {
        return Err(LedgerError::InvalidBlock(format!(
            "difficulty {} is below the minimum {MIN_DIFFICULTY}",
            block.difficulty
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxInput, TxOutput};

    fn payload(tag: &str) -> Vec<Transaction> {
        vec![Transaction {
            id: tag.to_string(),
            input: TxInput {
                timestamp: 1,
                amount: 10,
                address: "alice".to_string(),
                signature: String::new(),
            },
            outputs: vec![TxOutput {
                amount: 10,
                address: "bob".to_string(),
            }],
        }]
    }

    fn mined(n: usize) -> Chain {
        let chain = Chain::new();
        for i in 0..n {
            chain.add_block(payload(&format!("b{i}"))).unwrap();
        }
        chain
    }

    #[test]
    fn starts_with_genesis() {
        let chain = Chain::new();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.blocks()[0], Block::genesis());
    }

    #[test]
    fn add_block_extends_tail() {
        let chain = Chain::new();
        let block = chain.add_block(payload("foo")).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.tail(), block);
        assert_eq!(block.last_hash, Block::genesis().hash);
    }

    #[test]
    fn append_rejects_wrong_parent() {
        let chain = mined(1);
        let stale = Block::mine(&Block::genesis(), payload("late"));
        let err = chain.append(stale).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidBlock(_)));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn append_rejects_forged_proof() {
        let chain = Chain::new();
        let mut block = Block::mine(&Block::genesis(), payload("x"));
        // consistent hash, but not one that meets the difficulty
        loop {
            block.nonce += 1;
            block.hash = block.compute_hash();
            if !crate::pow::meets_difficulty(&block.hash, block.difficulty) {
                break;
            }
        }
        assert!(matches!(
            chain.append(block),
            Err(LedgerError::InvalidBlock(_))
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn genesis_only_chain_is_valid() {
        assert!(Chain::is_valid_chain(&[Block::genesis()]));
    }

    #[test]
    fn bad_genesis_is_invalid() {
        let mut bad = Block::genesis();
        bad.data = payload("bad");
        assert!(!Chain::is_valid_chain(&[bad]));
        assert!(!Chain::is_valid_chain(&[]));
    }

    #[test]
    fn mined_chain_is_valid() {
        let chain = mined(3);
        assert!(Chain::is_valid_chain(&chain.blocks()));
    }

    #[test]
    fn tampered_block_invalidates_chain() {
        let chain = mined(2);
        let mut blocks = chain.blocks().to_vec();
        blocks[1].data[0].outputs[0].amount = 11;
        assert!(!Chain::is_valid_chain(&blocks));
    }

    #[test]
    fn broken_link_invalidates_chain() {
        let chain = mined(2);
        let mut blocks = chain.blocks().to_vec();
        blocks[2].last_hash = "c0rrupt".to_string();
        assert!(!Chain::is_valid_chain(&blocks));
    }

    #[test]
    fn replaces_with_longer_valid_chain() {
        let local = Chain::new();
        let remote = mined(2);
        let before = local.generation();

        local.replace_chain(remote.blocks().to_vec()).unwrap();

        assert_eq!(*local.blocks(), *remote.blocks());
        assert_eq!(local.generation(), before + 1);
    }

    #[test]
    fn keeps_chain_when_candidate_not_longer() {
        let local = mined(1);
        let snapshot = local.blocks();
        let equal = mined(1);
        let shorter = Chain::new();

        assert!(matches!(
            local.replace_chain(equal.blocks().to_vec()),
            Err(LedgerError::RejectedChain(_))
        ));
        assert!(local.replace_chain(shorter.blocks().to_vec()).is_err());
        assert_eq!(local.blocks(), snapshot);
        assert_eq!(local.generation(), 0);
    }

    #[test]
    fn longer_chain_with_invalid_link_is_rejected() {
        let local = mined(1);
        let snapshot = local.blocks();
        let mut candidate = mined(3).blocks().to_vec();
        candidate[2].data = payload("forged");

        assert!(local.replace_chain(candidate).is_err());
        assert_eq!(local.blocks(), snapshot);
    }

    #[test]
    fn old_snapshot_survives_replacement() {
        let local = mined(1);
        let snapshot = local.blocks();
        local.replace_chain(mined(2).blocks().to_vec()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(local.len(), 3);
    }

    #[test]
    fn equal_length_forks_stay_divergent() {
        let nodes = [mined(1), mined(1), mined(1)];
        let tails: Vec<Block> = nodes.iter().map(Chain::tail).collect();

        for (i, node) in nodes.iter().enumerate() {
            for (j, other) in nodes.iter().enumerate() {
                if i != j {
                    assert!(node.replace_chain(other.blocks().to_vec()).is_err());
                }
            }
        }

        for (node, tail) in nodes.iter().zip(&tails) {
            assert_eq!(node.len(), 2);
            assert_eq!(&node.tail(), tail);
        }
    }

    #[test]
    fn replacement_interrupts_search_in_progress() {
        let local = Chain::new();
        let started = local.generation();
        // unreachable difficulty keeps the search running until cancelled
        let parent = Block {
            timestamp: crate::now_millis(),
            difficulty: 60,
            ..Block::genesis()
        };
        let longer = mined(1).blocks().to_vec();

        let result = std::thread::scope(|s| {
            let search = s.spawn(|| {
                Block::mine_until(&parent, vec![], || local.generation() != started)
            });
            std::thread::sleep(std::time::Duration::from_millis(50));
            local.replace_chain(longer).unwrap();
            search.join().unwrap()
        });
        assert!(result.is_none());
        assert_eq!(local.len(), 2);
    }

    #[test]
    fn stale_generation_interrupts_add_block() {
        let local = Chain::new();
        let started = local.generation();
        local.replace_chain(mined(1).blocks().to_vec()).unwrap();

        let err = local.add_block_cancellable(payload("late"), started).unwrap_err();
        assert_eq!(err, LedgerError::MiningInterrupted);
        assert_eq!(local.len(), 2);
    }

    #[test]
    fn cancellable_add_block_succeeds_without_replacement() {
        let chain = Chain::new();
        let block = chain
            .add_block_cancellable(payload("c"), chain.generation())
            .unwrap();
        assert_eq!(chain.tail(), block);
    }

    /// Search nonces at a fixed difficulty, ignoring the adjustment rule.
    fn mine_at(parent: &Block, difficulty: u32) -> Block {
        let timestamp = crate::now_millis();
        let mut nonce = 0;
        loop {
            nonce += 1;
            let hash = Block::hash_fields(timestamp, &parent.hash, &[], nonce, difficulty);
            if crate::pow::meets_difficulty(&hash, difficulty) {
                return Block {
                    timestamp,
                    last_hash: parent.hash.clone(),
                    hash,
                    data: vec![],
                    nonce,
                    difficulty,
                };
            }
        }
    }

    #[test]
    fn any_difficulty_with_valid_proof_is_accepted() {
        // genesis is at 3; a jump to 1 is still a valid link
        let block = mine_at(&Block::genesis(), 1);
        assert!(Chain::is_valid_chain(&[Block::genesis(), block]));
    }

    #[test]
    fn difficulty_below_floor_is_rejected() {
        let block = mine_at(&Block::genesis(), 0);
        assert!(block.has_valid_proof());
        assert!(!Chain::is_valid_chain(&[Block::genesis(), block]));
    }
}

use crate::constants::{
    DIFFICULTY, GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_TIMESTAMP, MINE_RATE, MIN_DIFFICULTY,
};
use crate::crypto::{canonical_json, hash_hex};
use crate::pow::meets_difficulty;
use crate::transaction::Transaction;
use crate::now_millis;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Milliseconds since the epoch when the proof was found.
    pub timestamp: u64,
    pub last_hash: String,
    pub hash: String,
    pub data: Vec<Transaction>,
    pub nonce: u64,
    pub difficulty: u32,
}

impl Block {
    /// The fixed first block. Never mined, exempt from proof-of-work.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: Vec::new(),
            nonce: 0,
            difficulty: DIFFICULTY,
        }
    }

    pub fn hash_fields(
        timestamp: u64,
        last_hash: &str,
        data: &[Transaction],
        nonce: u64,
        difficulty: u32,
    ) -> String {
        hash_hex(&format!(
            "{timestamp}{last_hash}{}{nonce}{difficulty}",
            canonical_json(data)
        ))
    }

    /// Recompute the hash from the block's contents.
    pub fn compute_hash(&self) -> String {
        Self::hash_fields(
            self.timestamp,
            &self.last_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    pub fn has_valid_proof(&self) -> bool {
        self.hash == self.compute_hash() && meets_difficulty(&self.hash, self.difficulty)
    }

    pub fn mine(parent: &Block, data: Vec<Transaction>) -> Block {
        Self::mine_until(parent, data, || false)
            .expect("uncancelled search always finds a nonce")
    }

    /// Search nonces on top of `parent` until the hash meets the adjusted
    /// difficulty. `cancelled` is polled on every attempt; returns `None`
    /// once it reports true.
    pub fn mine_until<F>(parent: &Block, data: Vec<Transaction>, cancelled: F) -> Option<Block>
    where
        F: Fn() -> bool,
    {
        let payload = canonical_json(&data);
        let mut nonce: u64 = 0;
        loop {
            if cancelled() {
                return None;
            }
            nonce = nonce.wrapping_add(1);
            let timestamp = now_millis();
            let difficulty = Self::adjust_difficulty(parent, timestamp);
            let hash = hash_hex(&format!(
                "{timestamp}{}{payload}{nonce}{difficulty}",
                parent.hash
            ));
            if meets_difficulty(&hash, difficulty) {
                return Some(Block {
                    timestamp,
                    last_hash: parent.hash.clone(),
                    hash,
                    data,
                    nonce,
                    difficulty,
                });
            }
        }
    }

    /// One step harder if `parent` was mined less than `MINE_RATE` ago,
    /// otherwise one step easier, never below `MIN_DIFFICULTY`.
    pub fn adjust_difficulty(parent: &Block, current_time: u64) -> u32 {
        if parent.timestamp.saturating_add(MINE_RATE) > current_time {
            parent.difficulty + 1
        } else {
            parent.difficulty.saturating_sub(1).max(MIN_DIFFICULTY)
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block - timestamp: {} last hash: {:.10} hash: {:.10} nonce: {} difficulty: {} txs: {}",
            self.timestamp,
            self.last_hash,
            self.hash,
            self.nonce,
            self.difficulty,
            self.data.len()
        )
    }
}

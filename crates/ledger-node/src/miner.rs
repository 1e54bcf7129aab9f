use anyhow::{Context, Result};
use ledger_core::{Block, Chain, Transaction, TransactionPool, Wallet};
use ledger_p2p::Broadcast;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Runs one mining round: pool → reward → proof-of-work → gossip → clear.
pub struct Miner<B: Broadcast> {
    chain: Chain,
    pool: Arc<dyn TransactionPool>,
    wallet: Arc<Mutex<Wallet>>,
    blockchain_wallet: Wallet,
    p2p: Arc<B>,
}

impl<B: Broadcast> Miner<B> {
    pub fn new(
        chain: Chain,
        pool: Arc<dyn TransactionPool>,
        wallet: Arc<Mutex<Wallet>>,
        p2p: Arc<B>,
    ) -> Result<Self> {
        Ok(Self {
            chain,
            pool,
            wallet,
            blockchain_wallet: Wallet::blockchain_wallet()?,
            p2p,
        })
    }

    /// Mine the pool's valid transactions plus a reward into a new block.
    ///
    /// The search runs on a blocking worker and gives up with
    /// `LedgerError::MiningInterrupted` if a longer chain is adopted at any
    /// point after the round started; the pool is left untouched and nothing
    /// is broadcast in that case.
    pub async fn mine(&self) -> Result<Block> {
        let started = self.chain.generation();
        let mut data = self.pool.valid_transactions();
        let reward = {
            let wallet = self.wallet.lock().unwrap_or_else(PoisonError::into_inner);
            Transaction::reward_transaction(&wallet, &self.blockchain_wallet)?
        };
        data.push(reward);

        let chain = self.chain.clone();
        let block =
            tokio::task::spawn_blocking(move || chain.add_block_cancellable(data, started))
                .await
                .context("mining task failed")??;
        info!(
            hash = %block.hash,
            difficulty = block.difficulty,
            nonce = block.nonce,
            txs = block.data.len(),
            "mined block"
        );

        self.p2p.sync_chains();
        self.pool.clear();
        self.p2p.broadcast_clear_transactions();
        Ok(block)
    }
}

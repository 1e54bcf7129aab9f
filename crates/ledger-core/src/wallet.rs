use crate::balance::balance;
use crate::constants::INITIAL_BALANCE;
use crate::crypto::{self, sha256};
use crate::error::{LedgerError, Result};
use crate::pool::TransactionPool;
use crate::transaction::Transaction;
use crate::{Block, Hash};
use secp256k1::{Secp256k1, SecretKey};
use std::fmt;
use tracing::warn;

const BLOCKCHAIN_WALLET_SEED: &[u8] = b"blockchain-wallet";

pub struct Wallet {
    secret: SecretKey,
    public_key: String,
    /// Baseline used when the chain holds no transaction authored by this wallet.
    opening_balance: u64,
    /// Last computed balance. Recomputed before every spend.
    balance: u64,
}

impl Wallet {
    pub fn new() -> Self {
        let (secret, public_key) = crypto::generate_keypair();
        Self {
            secret,
            public_key,
            opening_balance: INITIAL_BALANCE,
            balance: INITIAL_BALANCE,
        }
    }

    /// The system identity that signs mining rewards. Same key on every node.
    pub fn blockchain_wallet() -> Result<Self> {
        let secret = SecretKey::from_slice(&sha256(BLOCKCHAIN_WALLET_SEED))
            .map_err(|e| LedgerError::Crypto(e.to_string()))?;
        let public_key = hex::encode(secret.public_key(&Secp256k1::signing_only()).serialize());
        Ok(Self {
            secret,
            public_key,
            opening_balance: INITIAL_BALANCE,
            balance: INITIAL_BALANCE,
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn sign(&self, digest: &Hash) -> Result<String> {
        crypto::sign(&self.secret, digest)
    }

    pub fn calculate_balance(&self, chain: &[Block]) -> u64 {
        balance(&self.public_key, chain, self.opening_balance)
    }

    /// Build (or extend) this wallet's pending transaction and put it in the pool.
    pub fn create_transaction(
        &mut self,
        recipient: &str,
        amount: u64,
        chain: &[Block],
        pool: &dyn TransactionPool,
    ) -> Result<Transaction> {
        self.balance = self.calculate_balance(chain);

        if amount > self.balance {
            warn!(amount, balance = self.balance, "amount exceeds current balance");
            return Err(LedgerError::InsufficientBalance {
                amount,
                balance: self.balance,
            });
        }

        let tx = match pool.existing_transaction(&self.public_key) {
            Some(mut tx) => {
                tx.update(self, recipient, amount)?;
                tx
            }
            None => Transaction::new_transaction(self, recipient, amount)?,
        };
        pool.update_or_add_transaction(tx.clone());
        Ok(tx)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("public_key", &self.public_key)
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wallet - publicKey: {} balance: {}",
            self.public_key, self.balance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::pool::MemPool;

    #[test]
    fn blockchain_wallet_is_fixed() {
        let a = Wallet::blockchain_wallet().unwrap();
        let b = Wallet::blockchain_wallet().unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(Wallet::new().public_key(), a.public_key());
    }

    #[test]
    fn create_transaction_adds_to_pool() {
        let chain = Chain::new();
        let pool = MemPool::new();
        let mut wallet = Wallet::new();

        let tx = wallet
            .create_transaction("r4nd-4ddr", 50, &chain.blocks(), &pool)
            .unwrap();
        assert_eq!(pool.transactions(), vec![tx]);
    }

    #[test]
    fn repeated_spends_extend_the_pending_transaction() {
        let chain = Chain::new();
        let pool = MemPool::new();
        let mut wallet = Wallet::new();

        wallet
            .create_transaction("r4nd-4ddr", 50, &chain.blocks(), &pool)
            .unwrap();
        let tx = wallet
            .create_transaction("r4nd-4ddr", 50, &chain.blocks(), &pool)
            .unwrap();

        assert_eq!(pool.transactions().len(), 1);
        let change = tx
            .outputs
            .iter()
            .find(|o| o.address == wallet.public_key())
            .unwrap();
        assert_eq!(change.amount, INITIAL_BALANCE - 100);
        let paid: Vec<u64> = tx
            .outputs
            .iter()
            .filter(|o| o.address == "r4nd-4ddr")
            .map(|o| o.amount)
            .collect();
        assert_eq!(paid, vec![50, 50]);
    }

    #[test]
    fn overspend_is_reported_and_pool_untouched() {
        let chain = Chain::new();
        let pool = MemPool::new();
        let mut wallet = Wallet::new();

        let err = wallet
            .create_transaction("r4nd-4ddr", INITIAL_BALANCE + 1, &chain.blocks(), &pool)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert!(pool.transactions().is_empty());
    }

    #[test]
    fn balance_follows_the_chain() {
        let chain = Chain::new();
        let pool = MemPool::new();
        let mut sender = Wallet::new();
        let mut receiver = Wallet::new();

        for _ in 0..2 {
            sender
                .create_transaction(receiver.public_key(), 30, &chain.blocks(), &pool)
                .unwrap();
        }
        chain.add_block(pool.valid_transactions()).unwrap();
        pool.clear();

        assert_eq!(sender.calculate_balance(&chain.blocks()), INITIAL_BALANCE - 60);
        assert_eq!(
            receiver.calculate_balance(&chain.blocks()),
            INITIAL_BALANCE + 60
        );

        // receiver spends; its balance restarts from the change output
        std::thread::sleep(std::time::Duration::from_millis(2));
        let spend = receiver
            .create_transaction(sender.public_key(), 10, &chain.blocks(), &pool)
            .unwrap();
        assert_eq!(spend.outputs[0].amount, INITIAL_BALANCE + 50);
        chain.add_block(pool.valid_transactions()).unwrap();
        assert_eq!(
            receiver.calculate_balance(&chain.blocks()),
            INITIAL_BALANCE + 50
        );
        assert_eq!(sender.calculate_balance(&chain.blocks()), INITIAL_BALANCE - 50);
    }
}

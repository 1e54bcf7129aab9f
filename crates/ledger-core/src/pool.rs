use crate::transaction::Transaction;
use std::sync::{PoisonError, RwLock};
use tracing::warn;

/// Pending transactions not yet included in a block.
pub trait TransactionPool: Send + Sync {
    fn transactions(&self) -> Vec<Transaction>;
    /// Transactions whose outputs balance against their input and whose
    /// signature verifies.
    fn valid_transactions(&self) -> Vec<Transaction>;
    fn clear(&self);
    /// Replace the pooled transaction with the same id, or add it.
    fn update_or_add_transaction(&self, transaction: Transaction);
    /// The pending transaction authored by `address`, if any.
    fn existing_transaction(&self, address: &str) -> Option<Transaction>;
}

#[derive(Default)]
pub struct MemPool {
    transactions: RwLock<Vec<Transaction>>,
}

impl MemPool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionPool for MemPool {
    fn transactions(&self) -> Vec<Transaction> {
        self.transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn valid_transactions(&self) -> Vec<Transaction> {
        self.transactions()
            .into_iter()
            .filter(|tx| {
                match tx.output_total() {
                    Some(total) if total == tx.input.amount => {}
                    Some(_) => {
                        warn!(id = %tx.id, address = %tx.input.address, "invalid transaction: outputs do not match input");
                        return false;
                    }
                    None => {
                        warn!(id = %tx.id, address = %tx.input.address, "invalid transaction: output total overflows");
                        return false;
                    }
                }
                if !tx.verify() {
                    warn!(id = %tx.id, address = %tx.input.address, "invalid signature");
                    return false;
                }
                true
            })
            .collect()
    }

    fn clear(&self) {
        self.transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn update_or_add_transaction(&self, transaction: Transaction) {
        let mut txs = self
            .transactions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match txs.iter_mut().find(|t| t.id == transaction.id) {
            Some(existing) => *existing = transaction,
            None => txs.push(transaction),
        }
    }

    fn existing_transaction(&self, address: &str) -> Option<Transaction> {
        self.transactions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.input.address == address)
            .cloned()
    }
}

use crate::constants::MINING_REWARD;
use crate::crypto::{self, verify_signature};
use crate::error::{LedgerError, Result};
use crate::now_millis;
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Milliseconds since the epoch at signing time.
    pub timestamp: u64,
    /// Sender balance the outputs were drawn from.
    pub amount: u64,
    /// Sender address (compressed public key, hex).
    pub address: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub input: TxInput,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Pay `amount` to `recipient`, returning the remainder to the sender.
    pub fn new_transaction(sender: &Wallet, recipient: &str, amount: u64) -> Result<Self> {
        if amount > sender.balance() {
            return Err(LedgerError::InsufficientBalance {
                amount,
                balance: sender.balance(),
            });
        }
        let outputs = vec![
            TxOutput {
                amount: sender.balance() - amount,
                address: sender.public_key().to_string(),
            },
            TxOutput {
                amount,
                address: recipient.to_string(),
            },
        ];
        Self::with_outputs(sender, outputs)
    }

    /// Credit `miner` with the block reward, signed by the system wallet.
    pub fn reward_transaction(miner: &Wallet, blockchain_wallet: &Wallet) -> Result<Self> {
        let outputs = vec![TxOutput {
            amount: MINING_REWARD,
            address: miner.public_key().to_string(),
        }];
        Self::with_outputs(blockchain_wallet, outputs)
    }

    fn with_outputs(sender: &Wallet, outputs: Vec<TxOutput>) -> Result<Self> {
        let mut tx = Transaction {
            id: crypto::id(),
            input: TxInput {
                timestamp: 0,
                amount: 0,
                address: String::new(),
                signature: String::new(),
            },
            outputs,
        };
        tx.sign(sender)?;
        Ok(tx)
    }

    /// Add another payment to a pending transaction by drawing it from the
    /// sender's change output.
    pub fn update(&mut self, sender: &Wallet, recipient: &str, amount: u64) -> Result<()> {
        let change = self
            .outputs
            .iter_mut()
            .find(|o| o.address == sender.public_key())
            .ok_or(LedgerError::InsufficientBalance { amount, balance: 0 })?;
        if amount > change.amount {
            return Err(LedgerError::InsufficientBalance {
                amount,
                balance: change.amount,
            });
        }
        change.amount -= amount;
        self.outputs.push(TxOutput {
            amount,
            address: recipient.to_string(),
        });
        self.sign(sender)
    }

    fn sign(&mut self, sender: &Wallet) -> Result<()> {
        let signature = sender.sign(&crypto::digest(&self.outputs))?;
        self.input = TxInput {
            timestamp: now_millis(),
            amount: sender.balance(),
            address: sender.public_key().to_string(),
            signature,
        };
        Ok(())
    }

    pub fn verify(&self) -> bool {
        verify_signature(
            &self.input.address,
            &self.input.signature,
            &crypto::digest(&self.outputs),
        )
    }

    /// Sum of all outputs, `None` on overflow.
    pub fn output_total(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, o| total.checked_add(o.amount))
    }
}

pub mod balance;
pub mod block;
pub mod chain;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod pool;
pub mod transaction;
pub mod wallet;

use std::time::{SystemTime, UNIX_EPOCH};

pub use block::Block;
pub use chain::Chain;
pub use error::LedgerError;
pub use pool::{MemPool, TransactionPool};
pub use transaction::{Transaction, TxInput, TxOutput};
pub use wallet::Wallet;

pub type Hash = [u8; 32];

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub mod pow {
    /// Number of leading `'0'` characters in a hex hash string.
    pub fn leading_zero_hex(hash: &str) -> u32 {
        hash.bytes().take_while(|b| *b == b'0').count() as u32
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        leading_zero_hex(hash) >= difficulty
    }
}

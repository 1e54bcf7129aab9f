use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid block: {0}")]
    InvalidBlock(String),
    #[error("rejected chain: {0}")]
    RejectedChain(String),
    #[error("amount {amount} exceeds balance {balance}")]
    InsufficientBalance { amount: u64, balance: u64 },
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("mining interrupted by a chain replacement")]
    MiningInterrupted,
    #[error("crypto: {0}")]
    Crypto(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

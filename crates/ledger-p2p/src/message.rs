use ledger_core::{Block, LedgerError, Transaction};
use serde::{Deserialize, Serialize};

/// One frame on the peer wire, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    Chain { chain: Vec<Block> },
    Transaction { transaction: Transaction },
    ClearTransactions,
}

impl PeerMessage {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(frame: &str) -> Result<Self, LedgerError> {
        serde_json::from_str(frame).map_err(|e| LedgerError::MalformedMessage(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Chain { .. } => "CHAIN",
            PeerMessage::Transaction { .. } => "TRANSACTION",
            PeerMessage::ClearTransactions => "CLEAR_TRANSACTIONS",
        }
    }
}

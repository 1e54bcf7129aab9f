pub mod message;
pub mod server;

use ledger_core::Transaction;

pub use message::PeerMessage;
pub use server::{P2pServer, PeerId};

/// Outbound gossip the miner and the HTTP surface depend on.
pub trait Broadcast: Send + Sync {
    /// Send the full local chain to every peer.
    fn sync_chains(&self);
    fn broadcast_transaction(&self, transaction: &Transaction);
    fn broadcast_clear_transactions(&self);
}

pub mod api;
pub mod config;
pub mod miner;

pub use config::NodeConfig;
pub use miner::Miner;

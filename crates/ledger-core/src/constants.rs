/// Difficulty of the genesis block, in leading zero hex characters.
pub const DIFFICULTY: u32 = 3;
/// Difficulty never drops below this after adjustment.
pub const MIN_DIFFICULTY: u32 = 1;
/// Target interval between blocks, in milliseconds.
pub const MINE_RATE: u64 = 3000;

pub const INITIAL_BALANCE: u64 = 500;
pub const MINING_REWARD: u64 = 50;

pub const GENESIS_TIMESTAMP: u64 = 0;
pub const GENESIS_LAST_HASH: &str = "-----";
pub const GENESIS_HASH: &str = "f1r57-h45h";

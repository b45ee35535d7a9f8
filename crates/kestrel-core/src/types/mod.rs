pub mod block;
pub mod extra;

pub use block::{Block, BlockHeader, GenesisConfig, VoteFlag};
pub use extra::{BftExtra, BFT_EXTRA_VERSION, EXTRA_VANITY};

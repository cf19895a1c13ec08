pub mod block_device;
pub mod cli_interface;
pub mod error;
mod fs;
pub mod fsck;
pub mod mkfs;
pub mod utils;
pub use fs::*;

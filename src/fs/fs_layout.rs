//! where every metadata structure lives on the device
//!
//! the layout is a fixed contract between `mkfs` and `fsck`:
//! - superblock
//! - freemap(block bitmap)
//! - inode bitmap
//! - root inode
//! - root record
//! - free space

use std::fmt;

use crate::utils::fs_size_calculator::{bitmap_blocks, blocks_for};

use super::{INODE_SIZE, RECORD_SIZE, SUPERBLOCK_SIZE};

/// block offsets and sizes of all metadata regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub block_size: u32,
    pub block_count: u64,
    pub inode_count: u64,
    pub superblock_size_blocks: u64,
    pub freemap_block: u64,
    pub freemap_size_blocks: u64,
    pub inodemap_block: u64,
    pub inodemap_size_blocks: u64,
    pub rootinode_block: u64,
    pub rootinode_size_blocks: u64,
    pub rootrecord_block: u64,
    pub rootrecord_size_blocks: u64,
    /// every block below this index holds metadata
    pub reserved_block_count: u64,
}

impl Layout {
    /// place all metadata regions for a device of `block_count` blocks,
    /// with an inode bitmap able to track `inode_count` inodes
    /// # Params
    /// - `block_size`: bytes per block, must not be zero
    /// - `block_count`: blocks addressable on the device
    /// - `inode_count`: capacity of the inode bitmap,
    /// `mkfs` uses `block_count` unless told otherwise
    pub fn plan(block_size: u32, block_count: u64, inode_count: u64) -> Self {
        debug_assert!(block_size > 0, "block size must not be zero");
        let superblock_size_blocks = blocks_for(SUPERBLOCK_SIZE as u64, block_size);
        let freemap_size_blocks = bitmap_blocks(block_count, block_size);
        let inodemap_size_blocks = bitmap_blocks(inode_count, block_size);
        let rootinode_size_blocks = blocks_for(INODE_SIZE as u64, block_size);
        let rootrecord_size_blocks = blocks_for(RECORD_SIZE as u64, block_size);

        let freemap_block = superblock_size_blocks;
        let inodemap_block = freemap_block + freemap_size_blocks;
        let rootinode_block = inodemap_block + inodemap_size_blocks;
        let rootrecord_block = rootinode_block + rootinode_size_blocks;

        Layout {
            block_size,
            block_count,
            inode_count,
            superblock_size_blocks,
            freemap_block,
            freemap_size_blocks,
            inodemap_block,
            inodemap_size_blocks,
            rootinode_block,
            rootinode_size_blocks,
            rootrecord_block,
            rootrecord_size_blocks,
            reserved_block_count: superblock_size_blocks
                + freemap_size_blocks
                + inodemap_size_blocks
                + rootinode_size_blocks
                + rootrecord_size_blocks,
        }
    }

    /// byte offset of a block on the device,
    /// `None` if it doesn't fit into a `u64`
    pub const fn offset_of(&self, block: u64) -> Option<u64> {
        block.checked_mul(self.block_size as u64)
    }

    /// true if the device has room for all metadata regions
    pub const fn fits(&self) -> bool {
        self.reserved_block_count <= self.block_count
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regions = [
            ("superblock", 0, self.superblock_size_blocks),
            ("freemap", self.freemap_block, self.freemap_size_blocks),
            ("inode bitmap", self.inodemap_block, self.inodemap_size_blocks),
            ("root inode", self.rootinode_block, self.rootinode_size_blocks),
            ("root record", self.rootrecord_block, self.rootrecord_size_blocks),
        ];
        for (name, start, size) in regions {
            writeln!(f, "{name:>12}: block {start}, {size} block(s)")?;
        }
        write!(
            f,
            "{:>12}: {} of {} blocks",
            "reserved", self.reserved_block_count, self.block_count
        )
    }
}

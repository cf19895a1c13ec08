use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::traits::OnDiskRegion;

use super::{Layout, Version, MFS_MAGIC, MFS_VERSION, ROOT_INODE, SUPERBLOCK_SIZE};

type BlockIndexType = u64;
/// The superblock of this filesystem
///
/// It is stored at [SUPERBLOCK_OFFSET](super::SUPERBLOCK_OFFSET),
/// zero padded to [SUPERBLOCK_SIZE] bytes. Field layout in bytes:
///
/// | offset | size | field |
/// |---|---|---|
/// | 0 | 4 | `version` |
/// | 4 | 4 | `magic` |
/// | 8 | 4 | `block_size` |
/// | 12 | 8 | `block_count` |
/// | 20 | 8 | `inode_count` |
/// | 28 | 8 | `freemap_block` |
/// | 36 | 8 | `rootinode_block` |
/// | 44 | 8 | `next_ino` |
/// | 52 | 1 | `mounted` |
/// | 53 | 4 | `mount_cnt` |
/// | 57 | 455 | padding |
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// packed (major, minor) version
    pub version: u32,
    /// magic number
    pub magic: u32,
    /// bytes per block
    pub block_size: u32,
    /// blocks addressable on the device
    pub block_count: u64,
    /// capacity of the inode bitmap
    pub inode_count: u64,
    pub freemap_block: BlockIndexType,
    pub rootinode_block: BlockIndexType,
    /// next inode number to hand out
    pub next_ino: u64,
    /// only ever set by a mounting driver
    pub mounted: bool,
    pub mount_cnt: u32,
}

impl SuperBlock {
    /// a fresh, unmounted superblock describing `layout`
    pub fn new(layout: &Layout) -> Self {
        SuperBlock {
            version: MFS_VERSION.pack(),
            magic: MFS_MAGIC,
            block_size: layout.block_size,
            block_count: layout.block_count,
            inode_count: layout.inode_count,
            freemap_block: layout.freemap_block,
            rootinode_block: layout.rootinode_block,
            next_ino: ROOT_INODE + 1,
            mounted: false,
            mount_cnt: 0,
        }
    }

    pub fn version(&self) -> Version {
        Version::unpack(self.version)
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == MFS_MAGIC
    }

    /// recompute the layout this superblock was created from
    ///
    /// `block_size` must not be zero
    pub fn layout(&self) -> Layout {
        Layout::plan(self.block_size, self.block_count, self.inode_count)
    }
}

impl OnDiskRegion for SuperBlock {
    const REGION_SIZE: usize = SUPERBLOCK_SIZE as usize;
}

impl fmt::Display for SuperBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version:         {}", self.version())?;
        writeln!(f, "magic:           {:#x}", self.magic)?;
        writeln!(f, "block_size:      {}", self.block_size)?;
        writeln!(f, "block_count:     {}", self.block_count)?;
        writeln!(f, "inode_count:     {}", self.inode_count)?;
        writeln!(f, "freemap_block:   {}", self.freemap_block)?;
        writeln!(f, "rootinode_block: {}", self.rootinode_block)?;
        writeln!(f, "next_ino:        {}", self.next_ino)?;
        writeln!(f, "mounted:         {}", self.mounted)?;
        write!(f, "mount_cnt:       {}", self.mount_cnt)
    }
}

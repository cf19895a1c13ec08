use serde::{Deserialize, Serialize};

use crate::utils::{
    time_util::{self, TimeDurationStruct},
    traits::OnDiskRegion,
};

use super::{INODE_SIZE, ROOT_INODE};

const S_IFMT: u32 = libc::S_IFMT as u32;
const S_IFDIR: u32 = libc::S_IFDIR as u32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// file type and permission bits
    pub mode: u32,
    pub created: TimeDurationStruct,
    pub modified: TimeDurationStruct,
    pub inode_no: u64,
    /// by convention the block of the superblock region
    pub inode_block: u64,
    /// the block holding this inode's record
    pub record_block: u64,
}

impl Inode {
    /// the root directory inode, whose record lives at `record_block`
    pub fn root(record_block: u64) -> Self {
        let now = time_util::now();
        Inode {
            mode: S_IFDIR | 0o755,
            created: now,
            modified: now,
            inode_no: ROOT_INODE,
            // the superblock region starts at block 0
            inode_block: 0,
            record_block,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

impl OnDiskRegion for Inode {
    const REGION_SIZE: usize = INODE_SIZE as usize;
}

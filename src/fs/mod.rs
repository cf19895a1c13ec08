//! on-disk structures of the mfs filesystem
pub mod bitmap;
pub mod fs_layout;
pub mod inode;
pub mod record;
pub mod superblock;
pub use bitmap::*;
pub use fs_layout::*;
pub use inode::*;
pub use record::*;
pub use superblock::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// identifies an mfs superblock, "MFS!" in ASCII
pub const MFS_MAGIC: u32 = 0x4d46_5321;
/// the on-disk format version this build writes and accepts
pub const MFS_VERSION: Version = Version { major: 1, minor: 0 };
/// reserved inode number of the root directory
pub const ROOT_INODE: u64 = 1;
/// the superblock lives at this byte offset
pub const SUPERBLOCK_OFFSET: u64 = 0;
/// bytes reserved for the padded superblock
pub const SUPERBLOCK_SIZE: u32 = 512;
/// bytes reserved for one inode
pub const INODE_SIZE: u32 = 128;
/// bytes reserved for one record
pub const RECORD_SIZE: u32 = 512;
/// longest name a record may carry
pub const MAX_NAME_LEN: usize = 255;

/// a (major, minor) compatibility tag, packed as `major << 16 | minor`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const fn pack(self) -> u32 {
        (self.major as u32) << 16 | self.minor as u32
    }

    pub const fn unpack(packed: u32) -> Self {
        Version {
            major: (packed >> 16) as u16,
            minor: (packed & 0xffff) as u16,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_packing() {
        let v = Version { major: 3, minor: 7 };
        assert_eq!(v.pack(), 0x0003_0007);
        assert_eq!(Version::unpack(v.pack()), v);
        assert_eq!(MFS_VERSION.to_string(), "1.0");
    }
}

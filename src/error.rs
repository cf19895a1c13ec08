//! error types returned by the filesystem tools
use std::io;

use thiserror::Error;

use crate::fs::Version;

/// a bad configuration, detected before or right after opening the device
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no device given, please specify a device")]
    MissingDevice,
    #[error("device name too long ({len} bytes, at most {max})")]
    DeviceNameTooLong { len: usize, max: usize },
    #[error("blocksize must not be zero")]
    ZeroBlockSize,
    #[error("inode count must not be zero")]
    ZeroInodeCount,
    #[error("device reports an invalid sectorsize({0})")]
    InvalidSectorSize(u32),
    #[error("blocksize({block_size}) is smaller than sectorsize({sector_size})")]
    BlockSizeTooSmall { block_size: u32, sector_size: u32 },
    #[error("blocksize({block_size}) is not a multiple of sectorsize({sector_size})")]
    BlockSizeNotMultiple { block_size: u32, sector_size: u32 },
}

/// failures while turning an on-disk structure into bytes or back
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("decoding failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("{needed} bytes do not fit into a region of {region} bytes")]
    RegionOverflow { needed: usize, region: usize },
    #[error("name is {len} bytes long, at most {max} are allowed")]
    NameTooLong { len: usize, max: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BitmapError {
    #[error("bit {index} is out of range for a bitmap of {len} bits")]
    OutOfRange { index: u64, len: u64 },
    #[error("bitmap needs {expected} bytes, got {found}")]
    LengthMismatch { expected: u64, found: u64 },
}

/// everything that can abort `mkfs`
#[derive(Error, Debug)]
pub enum FormatError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("device I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("block device has no free space ({available} blocks available, {required} required)")]
    NoSpace { available: u64, required: u64 },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Bitmap(#[from] BitmapError),
}

/// everything that can abort `fsck`
#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("device I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid magic number {found:#x}, expected {expected:#x}")]
    InvalidMagic { found: u32, expected: u32 },
    #[error("filesystem version {found} is not supported, expected {expected}")]
    VersionMismatch { found: Version, expected: Version },
    #[error("filesystem is mounted (mount count {mount_cnt}), use force to check anyway")]
    AlreadyMounted { mount_cnt: u32 },
    #[error("superblock is corrupt: {0}")]
    CorruptSuperblock(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Bitmap(#[from] BitmapError),
}

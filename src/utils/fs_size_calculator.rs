//! This module contains functions to calculate the size of different fs components

/// bits held by one bitmap word
pub const BITS_PER_WORD: u64 = u64::BITS as u64;
/// bytes occupied by one bitmap word on disk
pub const WORD_SIZE: u64 = std::mem::size_of::<u64>() as u64;

/// calculate how many words a bitmap of `bits` bits needs
/// # Example
/// ```
/// use mfs::utils::fs_size_calculator::bitmap_words;
/// assert_eq!(bitmap_words(0), 0);
/// assert_eq!(bitmap_words(64), 1);
/// assert_eq!(bitmap_words(65), 2);
/// ```
pub const fn bitmap_words(bits: u64) -> u64 {
    bits.div_ceil(BITS_PER_WORD)
}

/// calculate needed bitmap size in bytes,
/// always a whole number of words
/// # Arguments
/// - `bits`: the number of tracked elements(blocks or inodes)
/// # Example
/// ```
/// use mfs::utils::fs_size_calculator::bitmap_bytes;
/// assert_eq!(bitmap_bytes(2048), 256);
/// assert_eq!(bitmap_bytes(100), 16);
/// ```
pub const fn bitmap_bytes(bits: u64) -> u64 {
    bitmap_words(bits) * WORD_SIZE
}

/// calculate how many blocks are needed to hold `bytes` bytes
/// # Example
/// ```
/// use mfs::utils::fs_size_calculator::blocks_for;
/// assert_eq!(blocks_for(256, 512), 1);
/// assert_eq!(blocks_for(513, 512), 2);
/// assert_eq!(blocks_for(0, 512), 0);
/// ```
pub const fn blocks_for(bytes: u64, block_size: u32) -> u64 {
    bytes.div_ceil(block_size as u64)
}

/// calculate the blocks needed by a bitmap tracking `bits` elements
/// # Example
/// ```
/// use mfs::utils::fs_size_calculator::bitmap_blocks;
/// // 2048 blocks -> 32 words -> 256 bytes -> 1 block of 512 bytes
/// assert_eq!(bitmap_blocks(2048, 512), 1);
/// assert_eq!(bitmap_blocks(8192, 512), 2);
/// ```
pub const fn bitmap_blocks(bits: u64, block_size: u32) -> u64 {
    blocks_for(bitmap_bytes(bits), block_size)
}

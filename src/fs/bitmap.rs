//! bit vectors tracking used blocks(the freemap) and used inodes
use std::fmt::Write;

use bitvec::prelude::*;

use crate::error::BitmapError;
use crate::utils::fs_size_calculator::{self, WORD_SIZE};

/// a fixed length bitmap, `1` means in use
///
/// bits are packed into 64-bit words, each word is stored little endian,
/// so bit `i` ends up in byte `i / 8` at bit position `i % 8`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: BitVec<u64, Lsb0>,
}

impl Bitmap {
    /// a zero filled bitmap of `bit_count` bits
    pub fn new(bit_count: u64) -> Self {
        Bitmap {
            bits: BitVec::repeat(false, bit_count as usize),
        }
    }

    /// the number of bits tracked
    pub fn len(&self) -> u64 {
        self.bits.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// the serialized size of a bitmap with `bit_count` bits
    pub const fn byte_len(bit_count: u64) -> u64 {
        fs_size_calculator::bitmap_bytes(bit_count)
    }

    /// set exactly one bit, leaving all others unchanged
    pub fn set(&mut self, index: u64) -> Result<(), BitmapError> {
        if index >= self.len() {
            return Err(BitmapError::OutOfRange {
                index,
                len: self.len(),
            });
        }
        self.bits.set(index as usize, true);
        Ok(())
    }

    /// mark the first `count` bits as used
    pub fn set_leading(&mut self, count: u64) -> Result<(), BitmapError> {
        if count > self.len() {
            return Err(BitmapError::OutOfRange {
                index: count - 1,
                len: self.len(),
            });
        }
        self.bits[..count as usize].fill(true);
        Ok(())
    }

    /// out of range bits read as unused
    pub fn get(&self, index: u64) -> bool {
        self.bits
            .get(index as usize)
            .as_deref()
            .copied()
            .unwrap_or(false)
    }

    pub fn count_ones(&self) -> u64 {
        self.bits.count_ones() as u64
    }

    /// indices of all used bits, ascending
    pub fn iter_ones(&self) -> impl Iterator<Item = u64> + '_ {
        self.bits.iter_ones().map(|i| i as u64)
    }

    /// serialize, producing exactly [byte_len](Bitmap::byte_len) bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits
            .as_raw_slice()
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect()
    }

    /// deserialize a bitmap of `bit_count` bits,
    /// `bytes` must be exactly [byte_len](Bitmap::byte_len) long
    pub fn from_bytes(bytes: &[u8], bit_count: u64) -> Result<Self, BitmapError> {
        let expected = Self::byte_len(bit_count);
        if bytes.len() as u64 != expected {
            return Err(BitmapError::LengthMismatch {
                expected,
                found: bytes.len() as u64,
            });
        }
        let words: Vec<u64> = bytes
            .chunks_exact(WORD_SIZE as usize)
            .map(|chunk| {
                let mut word = [0u8; WORD_SIZE as usize];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        let mut bits = BitVec::from_vec(words);
        bits.truncate(bit_count as usize);
        Ok(Bitmap { bits })
    }

    /// render serialized bitmap bytes for diagnostics:
    /// most significant byte first, each byte high bit to low bit,
    /// eight bytes per line
    pub fn dump(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() * 9 + bytes.len() / 8);
        for (i, byte) in bytes.iter().rev().enumerate() {
            if i > 0 {
                out.push(if i % 8 == 0 { '\n' } else { ' ' });
            }
            // writing into a String never fails
            let _ = write!(out, "{byte:08b}");
        }
        out
    }
}

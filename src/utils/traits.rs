use bincode::config;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CodecError;

/// no region is longer than this, so no decoded length may claim more bytes
pub const DECODE_LIMIT: usize = 512;

/// Trait for structures stored in a fixed-size region on the device
/// # Note
/// Encoding uses bincode's legacy configuration: little endian,
/// fixed width integers, `u32` enum tags and `u64` length prefixes.
/// The encoded bytes are padded with zeros up to [REGION_SIZE](OnDiskRegion::REGION_SIZE).
pub trait OnDiskRegion: Serialize + DeserializeOwned {
    /// size of the on-disk region in bytes, padding included
    const REGION_SIZE: usize;

    /// serialize into a zero padded buffer of exactly `REGION_SIZE` bytes
    fn to_region(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = bincode::serde::encode_to_vec(self, config::legacy())?;
        if buf.len() > Self::REGION_SIZE {
            return Err(CodecError::RegionOverflow {
                needed: buf.len(),
                region: Self::REGION_SIZE,
            });
        }
        buf.resize(Self::REGION_SIZE, 0);
        Ok(buf)
    }

    /// deserialize from the start of a region, trailing padding is ignored
    ///
    /// a length prefix claiming more than [DECODE_LIMIT] bytes is a decode error
    fn from_region(buf: &[u8]) -> Result<Self, CodecError> {
        let (object, _read): (Self, usize) = bincode::serde::decode_from_slice(
            buf,
            config::legacy().with_limit::<DECODE_LIMIT>(),
        )?;
        Ok(object)
    }
}

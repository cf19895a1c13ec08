//! create our filesystem
use crate::{
    block_device::{BlockDevice, FileDevice},
    error::{ConfigError, FormatError},
    fs::{Bitmap, Inode, Layout, Record, SuperBlock, MFS_VERSION, SUPERBLOCK_OFFSET},
    utils::traits::OnDiskRegion,
};
use byte_unit::Byte;
use log::{debug, error, info};
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};

/// longest accepted device path in bytes
pub const MAX_LEN_DEVICENAME: usize = 254;

/// what `mkfs` was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkfsConfig {
    /// the path of the block device or image file
    pub device: PathBuf,
    pub options: FormatOptions,
}

/// knobs of the on-disk layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// bytes per block, the device's sector size if `None`
    pub block_size: Option<u32>,
    /// capacity of the inode bitmap, one inode per block if `None`
    pub inode_count: Option<u64>,
}

impl FormatOptions {
    /// checks that need no device
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == Some(0) {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.inode_count == Some(0) {
            return Err(ConfigError::ZeroInodeCount);
        }
        Ok(())
    }

    /// pick the block size for a device with `sector_size` byte sectors
    pub fn resolve_block_size(&self, sector_size: u32) -> Result<u32, ConfigError> {
        if sector_size == 0 {
            return Err(ConfigError::InvalidSectorSize(sector_size));
        }
        let Some(block_size) = self.block_size else {
            return Ok(sector_size);
        };
        if block_size < sector_size {
            return Err(ConfigError::BlockSizeTooSmall {
                block_size,
                sector_size,
            });
        }
        if block_size % sector_size != 0 {
            return Err(ConfigError::BlockSizeNotMultiple {
                block_size,
                sector_size,
            });
        }
        Ok(block_size)
    }
}

/// check a device path before touching the device
pub(crate) fn validate_device_path(device: &std::path::Path) -> Result<(), ConfigError> {
    let len = device.as_os_str().len();
    if len == 0 {
        return Err(ConfigError::MissingDevice);
    }
    if len > MAX_LEN_DEVICENAME {
        return Err(ConfigError::DeviceNameTooLong {
            len,
            max: MAX_LEN_DEVICENAME,
        });
    }
    Ok(())
}

/// create a new filesystem on the device at `config.device`
///
/// the device is closed before returning, whether formatting worked or not
/// # Return
/// the layout that was written
pub fn mkfs(config: &MkfsConfig) -> Result<Layout, FormatError> {
    validate_device_path(&config.device)?;
    config.options.validate()?;

    debug!("opening block device {}", config.device.display());
    let mut device = FileDevice::open(&config.device)?;
    debug!("block device {} is open", config.device.display());

    let result = format(&mut device, &config.options);

    debug!("closing blockdevice");
    if let Err(e) = device.close() {
        error!("error closing blockdevice: {e}");
    } else {
        debug!("blockdevice closed");
    }
    result
}

/// write a fresh filesystem onto `device`
///
/// Writes, in this order: superblock, freemap, inode bitmap, root inode, root record.
/// Every write is flushed before the next one starts. A failure leaves the device
/// partially written.
/// # Params
/// - `device`: an open, exclusively owned device
/// - `options`: block size and inode bitmap capacity
/// # Return
/// the layout that was written
pub fn format<D>(device: &mut D, options: &FormatOptions) -> Result<Layout, FormatError>
where
    D: BlockDevice,
{
    options.validate()?;
    let sector_size = device.sector_size();
    let block_size = options.resolve_block_size(sector_size)?;
    debug!("blocksize: {block_size}, sectorsize: {sector_size}");

    let bytes = device.byte_capacity();
    let block_count = bytes / block_size as u64;
    if block_count == 0 {
        return Err(FormatError::NoSpace {
            available: 0,
            required: 1,
        });
    }
    info!(
        "device has {} free space in {} blocks",
        Byte::from_bytes((block_count * block_size as u64) as _).get_appropriate_unit(true),
        block_count
    );

    let inode_count = options.inode_count.unwrap_or(block_count);
    let layout = Layout::plan(block_size, block_count, inode_count);
    if !layout.fits() {
        return Err(FormatError::NoSpace {
            available: block_count,
            required: layout.reserved_block_count,
        });
    }
    debug!("layout:\n{layout}");

    let superblock = SuperBlock::new(&layout);
    debug!("writing superblock, version {MFS_VERSION}");
    write_region(device, SUPERBLOCK_OFFSET, &superblock.to_region()?)?;
    debug!("superblock written");

    let mut freemap = Bitmap::new(block_count);
    freemap.set_leading(layout.reserved_block_count)?;
    debug!(
        "writing free blocks bitmap (mapsize: {})",
        Byte::from_bytes(Bitmap::byte_len(block_count) as _).get_appropriate_unit(true)
    );
    write_bitmap(device, &layout, layout.freemap_block, &freemap)?;
    debug!("free blocks bitmap written");

    let inodemap = Bitmap::new(inode_count);
    debug!(
        "writing inode bitmap (mapsize: {})",
        Byte::from_bytes(Bitmap::byte_len(inode_count) as _).get_appropriate_unit(true)
    );
    write_bitmap(device, &layout, layout.inodemap_block, &inodemap)?;
    debug!("inode bitmap written");

    debug!("writing root inode and record");
    let root_inode = Inode::root(layout.rootrecord_block);
    write_region(
        device,
        block_offset(&layout, layout.rootinode_block)?,
        &root_inode.to_region()?,
    )?;
    write_region(
        device,
        block_offset(&layout, layout.rootrecord_block)?,
        &Record::root().to_region()?,
    )?;
    debug!("root directory written");

    info!(
        "created mfs {MFS_VERSION}: {} blocks of {} bytes, {} reserved",
        block_count, block_size, layout.reserved_block_count
    );
    Ok(layout)
}

fn block_offset(layout: &Layout, block: u64) -> Result<u64, FormatError> {
    layout.offset_of(block).ok_or_else(|| {
        FormatError::Io(io::Error::new(
            ErrorKind::InvalidInput,
            format!("block {block} lies beyond the addressable range"),
        ))
    })
}

fn write_region<D>(device: &mut D, offset: u64, bytes: &[u8]) -> Result<(), FormatError>
where
    D: BlockDevice,
{
    device.seek_to(offset)?;
    device.write_synced(bytes)?;
    Ok(())
}

/// bitmaps are padded with zeros to whole blocks
fn write_bitmap<D>(
    device: &mut D,
    layout: &Layout,
    block: u64,
    bitmap: &Bitmap,
) -> Result<(), FormatError>
where
    D: BlockDevice,
{
    let mut bytes = bitmap.to_bytes();
    let padded = bytes.len().div_ceil(layout.block_size as usize) * layout.block_size as usize;
    bytes.resize(padded, 0);
    write_region(device, block_offset(layout, block)?, &bytes)
}

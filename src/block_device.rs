//! the raw device `mkfs` and `fsck` operate on
use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind, Read, Seek, SeekFrom, Write},
    os::unix::{fs::FileTypeExt, io::AsRawFd},
    path::Path,
};

use log::{debug, trace};

/// sector size assumed when the device can't tell us
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// a byte addressable, random access medium
pub trait BlockDevice {
    /// read up to `buf.len()` bytes at the current position,
    /// `Ok(0)` means no data is available right now
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// write all of `data` at the current position and flush it to stable storage
    fn write_synced(&mut self, data: &[u8]) -> io::Result<()>;

    /// move the current position to `offset` bytes from the start
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;

    /// total size in bytes, 0 if unknown
    fn byte_capacity(&mut self) -> u64;

    /// native sector size in bytes
    fn sector_size(&mut self) -> u32;

    /// release the device
    fn close(self) -> io::Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }

    /// read exactly `len` bytes at the current position
    ///
    /// An empty read is not an error: the medium may not have the data yet,
    /// so we keep asking until it does or a real I/O error shows up.
    /// There is no timeout.
    fn read_full(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.read_some(&mut buf[filled..]) {
                Ok(0) => {
                    trace!("empty read with {} of {len} bytes done, retrying", filled);
                    std::hint::spin_loop();
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(buf)
    }
}

/// a device backed by a file, either an image file or a block special file
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    is_block_device: bool,
}

impl FileDevice {
    /// open `path` for reading and writing
    pub fn open<P>(path: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let is_block_device = file.metadata()?.file_type().is_block_device();
        debug!(
            "opened {} ({})",
            path.display(),
            if is_block_device { "block device" } else { "image file" }
        );
        Ok(FileDevice {
            file,
            is_block_device,
        })
    }

    #[cfg(target_os = "linux")]
    fn query_sector_size(&self) -> Option<u32> {
        // BLKSSZGET from <linux/fs.h>
        const BLKSSZGET: libc::c_ulong = 0x1268;
        let mut size: libc::c_int = 0;
        // Safety
        // the descriptor is owned by `self.file` and stays open for the call,
        // BLKSSZGET writes a single int into `size`
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                BLKSSZGET as _,
                &mut size as *mut libc::c_int,
            )
        };
        if ret == 0 && size > 0 {
            Some(size as u32)
        } else {
            None
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn query_sector_size(&self) -> Option<u32> {
        None
    }
}

impl BlockDevice for FileDevice {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write_synced(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.file.sync_data()
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn byte_capacity(&mut self) -> u64 {
        // seeking to the end works for both image files and block devices
        let Ok(current) = self.file.stream_position() else {
            return 0;
        };
        let end = self.file.seek(SeekFrom::End(0)).unwrap_or(0);
        if self.file.seek(SeekFrom::Start(current)).is_err() {
            return 0;
        }
        end
    }

    fn sector_size(&mut self) -> u32 {
        if self.is_block_device {
            self.query_sector_size().unwrap_or(DEFAULT_SECTOR_SIZE)
        } else {
            DEFAULT_SECTOR_SIZE
        }
    }

    fn close(self) -> io::Result<()> {
        self.file.sync_all()
    }
}

/// a fixed size device living in memory
#[derive(Debug, Clone)]
pub struct MemDevice {
    data: Vec<u8>,
    pos: u64,
    sector_size: u32,
    empty_reads: usize,
    syncs: usize,
}

impl MemDevice {
    /// a zero filled device of `capacity` bytes
    pub fn new(capacity: usize, sector_size: u32) -> Self {
        Self::from_bytes(vec![0u8; capacity], sector_size)
    }

    pub fn from_bytes(data: Vec<u8>, sector_size: u32) -> Self {
        MemDevice {
            data,
            pos: 0,
            sector_size,
            empty_reads: 0,
            syncs: 0,
        }
    }

    /// make the next `count` reads return no data
    pub fn stall_reads(&mut self, count: usize) {
        self.empty_reads = count;
    }

    /// the number of successful synced writes so far
    pub fn syncs(&self) -> usize {
        self.syncs
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl BlockDevice for MemDevice {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.empty_reads > 0 {
            self.empty_reads -= 1;
            return Ok(0);
        }
        let start = (self.pos as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write_synced(&mut self, data: &[u8]) -> io::Result<()> {
        let start = self.pos as usize;
        let end = start
            .checked_add(data.len())
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| io::Error::new(ErrorKind::WriteZero, "incomplete write to device"))?;
        self.data[start..end].copy_from_slice(data);
        self.pos = end as u64;
        self.syncs += 1;
        Ok(())
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn byte_capacity(&mut self) -> u64 {
        self.data.len() as u64
    }

    fn sector_size(&mut self) -> u32 {
        self.sector_size
    }
}

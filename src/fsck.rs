//! check an existing filesystem
use std::{
    fmt,
    io::{self, ErrorKind},
    path::PathBuf,
};

use log::{debug, error, trace, warn};

use crate::{
    block_device::{BlockDevice, FileDevice},
    error::CheckError,
    fs::{
        Bitmap, Inode, Layout, Record, SuperBlock, Version, INODE_SIZE, MFS_MAGIC, MFS_VERSION,
        RECORD_SIZE, ROOT_INODE, ROOT_NAME, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE,
    },
    mkfs::validate_device_path,
    utils::traits::OnDiskRegion,
};

/// what `fsck` was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsckConfig {
    /// the path of the block device or image file
    pub device: PathBuf,
    pub options: CheckOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// downgrade integrity failures(magic, version, mounted) to warnings
    pub force: bool,
}

/// checkpoints passed by a check, in order
///
/// the magic number is checked before the version,
/// a foreign superblock's version field means nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckStage {
    Opened,
    SuperblockRead,
    MagicChecked,
    VersionChecked,
    MountChecked,
    FreemapRead,
    Reported,
    Closed,
}

/// a problem found on the device that did not abort the check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// forced past a wrong magic number
    InvalidMagic { found: u32 },
    /// forced past an unsupported version
    VersionMismatch { found: Version },
    /// forced past the mounted flag
    Mounted { mount_cnt: u32 },
    /// a superblock field disagrees with the layout recomputed from it
    LayoutMismatch {
        field: &'static str,
        stored: u64,
        expected: u64,
    },
    /// metadata blocks the freemap claims are free
    UnmarkedMetadata { blocks: Vec<u64> },
    RootInode(String),
    RootRecord(String),
}

impl Finding {
    /// the error this finding turns into without force,
    /// `None` for findings that never abort
    fn fatal_error(&self) -> Option<CheckError> {
        match *self {
            Finding::InvalidMagic { found } => Some(CheckError::InvalidMagic {
                found,
                expected: MFS_MAGIC,
            }),
            Finding::VersionMismatch { found } => Some(CheckError::VersionMismatch {
                found,
                expected: MFS_VERSION,
            }),
            Finding::Mounted { mount_cnt } => Some(CheckError::AlreadyMounted { mount_cnt }),
            _ => None,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::InvalidMagic { found } => {
                write!(f, "invalid magic number {found:#x}, expected {MFS_MAGIC:#x}")
            }
            Finding::VersionMismatch { found } => {
                write!(f, "version {found} differs from supported version {MFS_VERSION}")
            }
            Finding::Mounted { mount_cnt } => {
                write!(f, "filesystem is marked mounted (mount count {mount_cnt})")
            }
            Finding::LayoutMismatch {
                field,
                stored,
                expected,
            } => write!(f, "{field} is {stored}, layout expects {expected}"),
            Finding::UnmarkedMetadata { blocks } => {
                write!(f, "metadata blocks marked free in freemap: {blocks:?}")
            }
            Finding::RootInode(reason) => write!(f, "root inode: {reason}"),
            Finding::RootRecord(reason) => write!(f, "root record: {reason}"),
        }
    }
}

/// what a check found
#[derive(Debug, Clone)]
pub struct Report {
    pub superblock: SuperBlock,
    /// the layout recomputed from the superblock
    pub layout: Layout,
    pub freemap: Bitmap,
    pub findings: Vec<Finding>,
}

impl Report {
    /// no findings at all
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn used_blocks(&self) -> u64 {
        self.freemap.count_ones()
    }

    pub fn free_blocks(&self) -> u64 {
        self.superblock.block_count - self.used_blocks()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sb = &self.superblock;
        write!(
            f,
            "mfs {}: {} blocks of {} bytes, {} used, {} free, {} finding(s)",
            sb.version(),
            sb.block_count,
            sb.block_size,
            self.used_blocks(),
            self.free_blocks(),
            self.findings.len()
        )
    }
}

fn enter(stage: &mut CheckStage, next: CheckStage) {
    trace!("fsck stage {:?} -> {:?}", stage, next);
    *stage = next;
}

/// abort with the finding's error, or record it as a warning when forced
fn report_or_abort(
    force: bool,
    finding: Finding,
    findings: &mut Vec<Finding>,
) -> Result<(), CheckError> {
    if let Some(error) = finding.fatal_error() {
        if !force {
            return Err(error);
        }
        warn!("{finding}, continuing because of force");
    } else {
        warn!("{finding}");
    }
    findings.push(finding);
    Ok(())
}

/// longest region read from a device that can't tell its size,
/// the freemap of 2^30 blocks
const MAX_UNSIZED_READ: u64 = 1 << 27;

/// read `len` bytes at `offset`, refusing regions past the end of a device of
/// known `capacity` instead of waiting on them forever
///
/// without a known capacity, regions longer than [MAX_UNSIZED_READ] are refused
fn read_region<D>(device: &mut D, capacity: u64, offset: u64, len: u64) -> io::Result<Vec<u8>>
where
    D: BlockDevice,
{
    if capacity > 0 && offset.saturating_add(len) > capacity {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("region {offset}+{len} lies beyond the device end ({capacity} bytes)"),
        ));
    }
    if capacity == 0 && len > MAX_UNSIZED_READ {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("region of {len} bytes is too long for a device of unknown size"),
        ));
    }
    let len = usize::try_from(len).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidData,
            format!("region of {len} bytes does not fit into memory"),
        )
    })?;
    device.seek_to(offset)?;
    device.read_full(len)
}

/// the byte offset of `block`, or why there is none
fn region_offset(layout: &Layout, block: u64) -> Result<u64, String> {
    layout
        .offset_of(block)
        .ok_or_else(|| format!("block {block} lies beyond the addressable range"))
}

/// check the filesystem at `config.device`
///
/// the device is closed before returning, whether the check passed or not
pub fn fsck(config: &FsckConfig) -> Result<Report, CheckError> {
    validate_device_path(&config.device)?;
    debug!("opening block device {}", config.device.display());
    let mut device = FileDevice::open(&config.device)?;

    let result = check(&mut device, &config.options);

    if let Err(e) = device.close() {
        error!("error closing blockdevice: {e}");
    }
    trace!("fsck stage {:?}", CheckStage::Closed);
    result
}

/// check the filesystem on an open `device`
///
/// Reads the superblock, validates magic, version and the mounted flag,
/// then reads the freemap and looks over the metadata `mkfs` created.
/// Nothing is written to the device.
pub fn check<D>(device: &mut D, options: &CheckOptions) -> Result<Report, CheckError>
where
    D: BlockDevice,
{
    let mut stage = CheckStage::Opened;
    let mut findings = Vec::new();
    let capacity = device.byte_capacity();

    let bytes = read_region(
        device,
        capacity,
        SUPERBLOCK_OFFSET,
        SUPERBLOCK_SIZE as u64,
    )?;
    let superblock = SuperBlock::from_region(&bytes)?;
    enter(&mut stage, CheckStage::SuperblockRead);
    debug!("superblock:\n{superblock}");

    if !superblock.has_valid_magic() {
        let finding = Finding::InvalidMagic {
            found: superblock.magic,
        };
        report_or_abort(options.force, finding, &mut findings)?;
    }
    enter(&mut stage, CheckStage::MagicChecked);

    if superblock.version() != MFS_VERSION {
        let finding = Finding::VersionMismatch {
            found: superblock.version(),
        };
        report_or_abort(options.force, finding, &mut findings)?;
    }
    enter(&mut stage, CheckStage::VersionChecked);

    if superblock.mounted {
        let finding = Finding::Mounted {
            mount_cnt: superblock.mount_cnt,
        };
        report_or_abort(options.force, finding, &mut findings)?;
    }
    enter(&mut stage, CheckStage::MountChecked);

    if superblock.block_size == 0 || superblock.block_count == 0 {
        return Err(CheckError::CorruptSuperblock(format!(
            "block size {} and block count {} describe no blocks",
            superblock.block_size, superblock.block_count
        )));
    }
    let layout = superblock.layout();
    if !layout.fits() {
        return Err(CheckError::CorruptSuperblock(format!(
            "{} blocks can't hold {} metadata blocks",
            layout.block_count, layout.reserved_block_count
        )));
    }

    let freemap_offset = region_offset(&layout, superblock.freemap_block)
        .map_err(|reason| CheckError::CorruptSuperblock(format!("freemap: {reason}")))?;
    let freemap_bytes = read_region(
        device,
        capacity,
        freemap_offset,
        Bitmap::byte_len(superblock.block_count),
    )?;
    let freemap = Bitmap::from_bytes(&freemap_bytes, superblock.block_count)?;
    enter(&mut stage, CheckStage::FreemapRead);
    trace!("freemap:\n{}", Bitmap::dump(&freemap_bytes));

    for finding in inspect_layout(&superblock, &layout, &freemap)
        .into_iter()
        .chain(inspect_root(device, capacity, &superblock, &layout))
    {
        report_or_abort(options.force, finding, &mut findings)?;
    }

    enter(&mut stage, CheckStage::Reported);
    Ok(Report {
        superblock,
        layout,
        freemap,
        findings,
    })
}

/// compare the stored region offsets and the freemap with the recomputed layout
fn inspect_layout(superblock: &SuperBlock, layout: &Layout, freemap: &Bitmap) -> Vec<Finding> {
    let mut findings = Vec::new();
    let stored_offsets = [
        ("freemap_block", superblock.freemap_block, layout.freemap_block),
        (
            "rootinode_block",
            superblock.rootinode_block,
            layout.rootinode_block,
        ),
    ];
    for (field, stored, expected) in stored_offsets {
        if stored != expected {
            findings.push(Finding::LayoutMismatch {
                field,
                stored,
                expected,
            });
        }
    }

    let blocks: Vec<u64> = (0..layout.reserved_block_count)
        .filter(|block| !freemap.get(*block))
        .collect();
    if !blocks.is_empty() {
        findings.push(Finding::UnmarkedMetadata { blocks });
    }
    findings
}

/// make sure the root directory bootstrap is where the layout says it is
fn inspect_root<D>(
    device: &mut D,
    capacity: u64,
    superblock: &SuperBlock,
    layout: &Layout,
) -> Vec<Finding>
where
    D: BlockDevice,
{
    let mut findings = Vec::new();
    let inode = region_offset(layout, superblock.rootinode_block)
        .and_then(|offset| {
            read_region(device, capacity, offset, INODE_SIZE as u64).map_err(|e| e.to_string())
        })
        .and_then(|bytes| Inode::from_region(&bytes).map_err(|e| e.to_string()));
    match inode {
        Err(reason) => findings.push(Finding::RootInode(format!("unreadable: {reason}"))),
        Ok(inode) => {
            if !inode.is_dir() {
                findings.push(Finding::RootInode(format!(
                    "mode {:#o} is not a directory",
                    inode.mode
                )));
            }
            if inode.inode_no != ROOT_INODE {
                findings.push(Finding::RootInode(format!(
                    "inode number {} instead of {ROOT_INODE}",
                    inode.inode_no
                )));
            }
            if inode.record_block != layout.rootrecord_block {
                findings.push(Finding::RootInode(format!(
                    "record block {} instead of {}",
                    inode.record_block, layout.rootrecord_block
                )));
            }
        }
    }

    let record = region_offset(layout, layout.rootrecord_block)
        .and_then(|offset| {
            read_region(device, capacity, offset, RECORD_SIZE as u64).map_err(|e| e.to_string())
        })
        .and_then(|bytes| Record::from_region(&bytes).map_err(|e| e.to_string()));
    match record {
        Err(reason) => findings.push(Finding::RootRecord(format!("unreadable: {reason}"))),
        Ok(record) => {
            if !record.is_dir() {
                findings.push(Finding::RootRecord("not a directory".to_string()));
            }
            if record.name() != ROOT_NAME {
                findings.push(Finding::RootRecord(format!(
                    "named {:?} instead of {ROOT_NAME:?}",
                    record.name()
                )));
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block_device::MemDevice,
        mkfs::{self, FormatOptions, MkfsConfig},
    };

    const MIB: usize = 1 << 20;
    const FORCE: CheckOptions = CheckOptions { force: true };
    const STRICT: CheckOptions = CheckOptions { force: false };

    fn formatted(capacity: usize, block_size: Option<u32>) -> MemDevice {
        let mut dev = MemDevice::new(capacity, 512);
        let options = FormatOptions {
            block_size,
            inode_count: None,
        };
        mkfs::format(&mut dev, &options).unwrap();
        dev
    }

    #[test]
    fn test_check_after_format() -> anyhow::Result<()> {
        for block_size in [None, Some(1024), Some(4096)] {
            let mut dev = formatted(MIB, block_size);
            let report = check(&mut dev, &STRICT)?;
            let bs = block_size.unwrap_or(512);
            assert!(report.is_clean(), "{:?}", report.findings);
            assert_eq!(report.superblock.block_size, bs);
            assert_eq!(report.superblock.block_count, MIB as u64 / bs as u64);
            assert_eq!(report.superblock.magic, MFS_MAGIC);
            assert_eq!(report.superblock.version(), MFS_VERSION);
            assert_eq!(report.used_blocks(), report.layout.reserved_block_count);
        }
        Ok(())
    }

    #[test]
    fn test_one_mib_device_report() -> anyhow::Result<()> {
        let mut dev = formatted(MIB, None);
        let report = check(&mut dev, &CheckOptions::default())?;
        assert_eq!(report.superblock.block_count, 2048);
        assert_eq!(report.layout.freemap_block, 1);
        assert_eq!(report.layout.inodemap_block, 2);
        assert_eq!(report.layout.rootinode_block, 3);
        assert_eq!(report.free_blocks(), 2048 - 5);
        assert_eq!(
            report.to_string(),
            "mfs 1.0: 2048 blocks of 512 bytes, 5 used, 2043 free, 0 finding(s)"
        );
        Ok(())
    }

    #[test]
    fn test_invalid_magic() {
        let mut dev = formatted(MIB, None);
        dev.as_bytes_mut()[4..8].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        assert!(matches!(
            check(&mut dev, &STRICT),
            Err(CheckError::InvalidMagic {
                found: 0xdead_beef,
                expected: MFS_MAGIC
            })
        ));
        let report = check(&mut dev, &FORCE).unwrap();
        assert_eq!(
            report.findings,
            vec![Finding::InvalidMagic { found: 0xdead_beef }]
        );
    }

    #[test]
    fn test_version_mismatch() {
        let mut dev = formatted(MIB, None);
        let newer = Version { major: 2, minor: 0 };
        dev.as_bytes_mut()[0..4].copy_from_slice(&newer.pack().to_le_bytes());
        assert!(matches!(
            check(&mut dev, &STRICT),
            Err(CheckError::VersionMismatch { found, expected })
                if found == newer && expected == MFS_VERSION
        ));
        let report = check(&mut dev, &FORCE).unwrap();
        assert_eq!(report.findings, vec![Finding::VersionMismatch { found: newer }]);

        let newer_minor = Version { major: 1, minor: 1 };
        dev.as_bytes_mut()[0..4].copy_from_slice(&newer_minor.pack().to_le_bytes());
        assert!(check(&mut dev, &STRICT).is_err());
    }

    #[test]
    fn test_mounted_guard() {
        let mut dev = formatted(MIB, None);
        let mut sb = SuperBlock::from_region(dev.as_bytes()).unwrap();
        sb.mounted = true;
        sb.mount_cnt = 7;
        let region = sb.to_region().unwrap();
        dev.as_bytes_mut()[..region.len()].copy_from_slice(&region);

        assert!(matches!(
            check(&mut dev, &STRICT),
            Err(CheckError::AlreadyMounted { mount_cnt: 7 })
        ));
        let report = check(&mut dev, &FORCE).unwrap();
        assert_eq!(report.findings, vec![Finding::Mounted { mount_cnt: 7 }]);
        assert!(report.superblock.mounted);
    }

    #[test]
    fn test_check_never_writes() {
        let mut dev = formatted(MIB, None);
        let before = dev.as_bytes().to_vec();
        let syncs = dev.syncs();
        check(&mut dev, &STRICT).unwrap();
        assert_eq!(dev.syncs(), syncs);
        assert_eq!(dev.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_zero_block_size_is_fatal_even_when_forced() {
        let mut dev = formatted(MIB, None);
        dev.as_bytes_mut()[8..12].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            check(&mut dev, &FORCE),
            Err(CheckError::CorruptSuperblock(_))
        ));
    }

    #[test]
    fn test_overflowing_freemap_block_is_fatal() {
        let mut dev = formatted(MIB, None);
        dev.as_bytes_mut()[28..36].copy_from_slice(&u64::MAX.to_le_bytes());
        for options in [STRICT, FORCE] {
            assert!(matches!(
                check(&mut dev, &options),
                Err(CheckError::CorruptSuperblock(_))
            ));
        }
    }

    #[test]
    fn test_overflowing_rootinode_block_is_reported() {
        let mut dev = formatted(MIB, None);
        dev.as_bytes_mut()[36..44].copy_from_slice(&u64::MAX.to_le_bytes());
        let report = check(&mut dev, &STRICT).unwrap();
        assert_eq!(report.findings.len(), 2);
        assert_eq!(
            report.findings[0],
            Finding::LayoutMismatch {
                field: "rootinode_block",
                stored: u64::MAX,
                expected: 3,
            }
        );
        assert!(matches!(
            &report.findings[1],
            Finding::RootInode(reason) if reason.starts_with("unreadable")
        ));
    }

    #[test]
    fn test_rootinode_block_past_device_end_is_reported() {
        let mut dev = formatted(MIB, None);
        dev.as_bytes_mut()[36..44].copy_from_slice(&(1u64 << 40).to_le_bytes());
        let report = check(&mut dev, &STRICT).unwrap();
        assert!(matches!(
            report.findings.last(),
            Some(Finding::RootInode(reason)) if reason.starts_with("unreadable")
        ));
    }

    #[test]
    fn test_huge_inode_count_is_fatal() {
        let mut dev = formatted(MIB, None);
        dev.as_bytes_mut()[20..28].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            check(&mut dev, &FORCE),
            Err(CheckError::CorruptSuperblock(_))
        ));
    }

    #[test]
    fn test_huge_block_count_is_refused() {
        let mut dev = formatted(MIB, None);
        dev.as_bytes_mut()[12..20].copy_from_slice(&(1u64 << 40).to_le_bytes());
        match check(&mut dev, &STRICT) {
            Err(CheckError::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    /// a device that can't tell its size
    struct UnsizedDevice(MemDevice);

    impl BlockDevice for UnsizedDevice {
        fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read_some(buf)
        }

        fn write_synced(&mut self, data: &[u8]) -> io::Result<()> {
            self.0.write_synced(data)
        }

        fn seek_to(&mut self, offset: u64) -> io::Result<()> {
            self.0.seek_to(offset)
        }

        fn byte_capacity(&mut self) -> u64 {
            0
        }

        fn sector_size(&mut self) -> u32 {
            self.0.sector_size()
        }
    }

    #[test]
    fn test_unsized_device() {
        let mut dev = UnsizedDevice(formatted(MIB, None));
        assert!(check(&mut dev, &STRICT).unwrap().is_clean());

        dev.0.as_bytes_mut()[12..20].copy_from_slice(&(1u64 << 40).to_le_bytes());
        match check(&mut dev, &STRICT) {
            Err(CheckError::Io(e)) => assert_eq!(e.kind(), ErrorKind::InvalidData),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn test_huge_root_name_length_is_reported() {
        let mut dev = formatted(MIB, None);
        // the name length prefix follows the record's type tag
        let at = 4 * 512 + 4;
        dev.as_bytes_mut()[at..at + 8].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
        let report = check(&mut dev, &STRICT).unwrap();
        assert_eq!(report.findings.len(), 1);
        assert!(matches!(
            &report.findings[0],
            Finding::RootRecord(reason) if reason.starts_with("unreadable")
        ));
    }

    #[test]
    fn test_unformatted_device() {
        let mut dev = MemDevice::new(MIB, 512);
        assert!(matches!(
            check(&mut dev, &STRICT),
            Err(CheckError::InvalidMagic { found: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_device() {
        let dev = formatted(MIB, None);
        let mut truncated = MemDevice::from_bytes(dev.as_bytes()[..700].to_vec(), 512);
        match check(&mut truncated, &STRICT) {
            Err(CheckError::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_reads_are_retried() {
        let mut dev = formatted(MIB, None);
        dev.stall_reads(16);
        assert!(check(&mut dev, &STRICT).unwrap().is_clean());
    }

    #[test]
    fn test_unmarked_metadata_is_reported() {
        let mut dev = formatted(MIB, None);
        // clear the bit of block 3(root inode), freemap starts at byte 512
        dev.as_bytes_mut()[512] &= !0b0000_1000;
        let report = check(&mut dev, &STRICT).unwrap();
        assert_eq!(
            report.findings,
            vec![Finding::UnmarkedMetadata { blocks: vec![3] }]
        );
    }

    #[test]
    fn test_broken_root_directory_is_reported() {
        let mut dev = formatted(MIB, None);
        let record = Record::directory("lost+found").unwrap().to_region().unwrap();
        dev.as_bytes_mut()[4 * 512..5 * 512].copy_from_slice(&record);
        dev.as_bytes_mut()[3 * 512..4 * 512].fill(0xff);
        let report = check(&mut dev, &STRICT).unwrap();
        // wrong mode, inode number and record block
        assert_eq!(report.findings.len(), 4);
        assert!(report.findings[..3]
            .iter()
            .all(|f| matches!(f, Finding::RootInode(_))));
        assert_eq!(
            report.findings[3],
            Finding::RootRecord("named \"lost+found\" instead of \"/\"".to_string())
        );
    }

    #[test]
    fn test_fsck_on_image_file() -> anyhow::Result<()> {
        let image = tempfile::NamedTempFile::new()?;
        image.as_file().set_len(MIB as u64)?;
        mkfs::mkfs(&MkfsConfig {
            device: image.path().to_path_buf(),
            options: FormatOptions::default(),
        })?;
        let report = fsck(&FsckConfig {
            device: image.path().to_path_buf(),
            options: CheckOptions::default(),
        })?;
        assert_eq!(report.superblock.block_count, 2048);
        assert!(report.is_clean());
        Ok(())
    }

    #[test]
    fn test_fsck_without_device() {
        let config = FsckConfig {
            device: PathBuf::new(),
            options: CheckOptions::default(),
        };
        assert!(matches!(fsck(&config), Err(CheckError::Config(_))));
    }
}

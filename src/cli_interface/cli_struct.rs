use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::{
    fsck::{CheckOptions, FsckConfig},
    mkfs::{FormatOptions, MkfsConfig},
};

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum MfsCli {
    /// create a new mfs filesystem on a device
    Mkfs(MkfsArgs),
    /// check an mfs filesystem on a device
    Fsck(FsckArgs),
}

/// make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "creates a mfs filesystem on a device")]
pub struct MkfsArgs {
    /// block device name or image file
    pub device: PathBuf,
    /// blocksize in bytes (default: use sectorsize of blockdevice)
    #[arg(short, long = "blocksize")]
    pub block_size: Option<u32>,
    /// inode bitmap capacity (default: one inode per block)
    #[arg(short, long)]
    pub inode_count: Option<u64>,
    /// report progress
    #[arg(short, long)]
    pub verbose: bool,
}

/// check a fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "checks a mfs filesystem on a device")]
pub struct FsckArgs {
    /// block device name or image file
    pub device: PathBuf,
    /// go on even if the filesystem is mounted or looks foreign
    #[arg(short, long)]
    pub force: bool,
    /// verbosity, `--verbose=2` also dumps the freemap
    #[arg(
        short,
        long,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = 0,
        default_missing_value = "1"
    )]
    pub verbose: u8,
}

impl MfsCli {
    /// the log level matching the requested verbosity
    pub fn log_level(&self) -> LevelFilter {
        let verbosity = match self {
            MfsCli::Mkfs(args) => args.verbose as u8,
            MfsCli::Fsck(args) => args.verbose,
        };
        match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

impl From<MkfsArgs> for MkfsConfig {
    fn from(args: MkfsArgs) -> Self {
        MkfsConfig {
            device: args.device,
            options: FormatOptions {
                block_size: args.block_size,
                inode_count: args.inode_count,
            },
        }
    }
}

impl From<FsckArgs> for FsckConfig {
    fn from(args: FsckArgs) -> Self {
        FsckConfig {
            device: args.device,
            options: CheckOptions { force: args.force },
        }
    }
}

/// test the `MfsCli` struct
/// test `mkfs` subcommand
#[cfg(test)]
mod mkfs_parse_args_tests {
    use super::*;
    /// test short parameter form
    #[test]
    fn test_short_parameter_form() {
        let args = MfsCli::parse_from(["mfs", "mkfs", "/dev/sdb1", "-b", "4096", "-v"]);
        assert_eq!(
            args,
            MfsCli::Mkfs(MkfsArgs {
                device: PathBuf::from("/dev/sdb1"),
                block_size: Some(4096),
                inode_count: None,
                verbose: true,
            })
        );
        assert_eq!(args.log_level(), LevelFilter::Debug);
    }
    /// test long parameter form
    #[test]
    fn test_long_parameter_form() {
        let args = MfsCli::parse_from([
            "mfs",
            "mkfs",
            "--blocksize",
            "1024",
            "--inode-count",
            "4096",
            "disk.img",
        ]);
        let MfsCli::Mkfs(args) = args else {
            panic!("expected mkfs");
        };
        let config = MkfsConfig::from(args);
        assert_eq!(config.device, PathBuf::from("disk.img"));
        assert_eq!(config.options.block_size, Some(1024));
        assert_eq!(config.options.inode_count, Some(4096));
    }

    #[test]
    fn test_defaults() {
        let args = MfsCli::parse_from(["mfs", "mkfs", "disk.img"]);
        assert_eq!(args.log_level(), LevelFilter::Warn);
        let MfsCli::Mkfs(args) = args else {
            panic!("expected mkfs");
        };
        assert_eq!(MkfsConfig::from(args).options, FormatOptions::default());
    }

    #[test]
    fn test_device_is_required() {
        assert!(MfsCli::try_parse_from(["mfs", "mkfs"]).is_err());
    }
}

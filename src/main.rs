use clap::Parser;
use mfs::{
    cli_interface::MfsCli,
    fsck::{self, FsckConfig},
    mkfs::{self, MkfsConfig},
};
/// a CLI interface to users to create our filesystem on a device,
/// or to check a filesystem created earlier.
///
/// Every fatal condition is reported on stderr and ends the program with a non-zero status.
fn main() -> anyhow::Result<()> {
    let args = MfsCli::parse();
    env_logger::builder()
        .format_timestamp_nanos()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();
    match args {
        MfsCli::Mkfs(args) => {
            //create a new file system
            let config = MkfsConfig::from(args);
            let layout = mkfs::mkfs(&config)?;
            println!(
                "created mfs on {}: {} blocks of {} bytes, {} reserved for metadata",
                config.device.display(),
                layout.block_count,
                layout.block_size,
                layout.reserved_block_count
            );
        }
        MfsCli::Fsck(args) => {
            //check an existing file system
            let config = FsckConfig::from(args);
            let report = fsck::fsck(&config)?;
            println!("{}: {report}", config.device.display());
            for finding in &report.findings {
                println!("  {finding}");
            }
        }
    }
    Ok(())
}

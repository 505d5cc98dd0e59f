//! `mkfs -o <image> [-s blocks] [-n ninodes]`: write a fresh xv6-style
//! filesystem image.
//!
//! Grounded on `LENSHOOD-xv6-rust/mkfs/src/main.rs`'s `Args`/CLI shape,
//! now a thin wrapper around `xv6fs::format::format` rather than the
//! original's hand-rolled sector writer.

mod device;

use std::path::PathBuf;

use clap::Parser;
use log::info;

use device::FileDevice;

#[derive(Parser, Debug)]
#[command(name = "mkfs", about = "Format an xv6-style filesystem image")]
struct Args {
    /// Path of the image file to create.
    #[arg(short, long)]
    output: PathBuf,

    /// Total size of the image, in blocks.
    #[arg(short, long, default_value_t = 2000)]
    size: u32,

    /// Number of inodes to reserve.
    #[arg(short, long, default_value_t = 200)]
    ninodes: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let device = FileDevice::create(&args.output, args.size)?;
    let sb = xv6fs::format::format(&device, args.size, args.ninodes)?;

    info!(
        "formatted {}: {} blocks ({} data), {} inodes, data starts at block {}",
        args.output.display(),
        sb.size,
        sb.nblocks,
        sb.ninodes,
        sb.data_start()
    );
    Ok(())
}

//! `checker <image-path>`: verify an xv6-style filesystem image offline.
//!
//! Exit codes (spec §6): 0 = image passes, 1 = detected inconsistency,
//! 2 = image could not be read at all. Diagnostics go to stderr, each
//! line prefixed by `error:` or `warning:`.

mod device;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;

use device::MmapDevice;

#[derive(Parser, Debug)]
#[command(name = "checker", about = "Verify an xv6-style filesystem image")]
struct Args {
    /// Path to the filesystem image to check.
    image: PathBuf,

    /// List every occupied root-directory entry as it's visited.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::from(0),
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let device = MmapDevice::open(&args.image)?;
    info!(
        "checking {} ({} bytes, {} blocks)",
        args.image.display(),
        device.byte_len(),
        device.nblocks()
    );

    let report = xv6fs::checker::check(&device, args.verbose)?;
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    for error in &report.errors {
        eprintln!("error: {error}");
    }
    Ok(report.is_clean())
}

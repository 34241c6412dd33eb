use std::process::ExitCode;

use byte_unit::Byte;
use clap::Parser;
use vfs::{
    cli_interface::VfsCli,
    copy::{self, CopyMode},
    Vfs,
};

/// a CLI interface to users to create our filesystem,
/// and to list, create, move, remove and copy paths inside it.
///
/// Every path is reported on its own; the exit code is non-zero
/// if any of them failed.
fn main() -> anyhow::Result<ExitCode> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = VfsCli::parse();
    let failures = match args {
        VfsCli::Mkfs(args) => {
            //create a new file system
            let stats = vfs::mkfs::mkfs(&args.image_file_path, args.size)?;
            println!(
                "Filesystem '{}' created: {} inodes, {} data blocks",
                args.image_file_path, stats.total_inodes, stats.total_blocks
            );
            0
        }
        VfsCli::Ls(args) => {
            let vfs = Vfs::open(&args.image_file_path)?;
            let mut failures = 0;
            for path in &args.paths {
                match vfs.list(path) {
                    Ok(names) => println!("{path}:\n{}", names.join(" ")),
                    Err(e) => {
                        println!("Failed to list path '{path}': {e}");
                        failures += 1;
                    }
                }
            }
            failures
        }
        VfsCli::Mkdir(args) => {
            let mut vfs = Vfs::open(&args.image_file_path)?;
            let mut failures = 0;
            for path in &args.paths {
                match vfs.create_dir(path) {
                    Ok(()) => println!("Directory '{path}' created"),
                    Err(e) => {
                        println!("Failed to create directory '{path}': {e}");
                        failures += 1;
                    }
                }
            }
            failures
        }
        VfsCli::Mv(args) => {
            let mut vfs = Vfs::open(&args.image_file_path)?;
            match vfs.rename(&args.source, &args.destination) {
                Ok(()) => {
                    println!("Moved '{}' to '{}'", args.source, args.destination);
                    0
                }
                Err(e) => {
                    println!("Failed to move '{}': {e}", args.source);
                    1
                }
            }
        }
        VfsCli::Rm(args) => {
            let mut vfs = Vfs::open(&args.image_file_path)?;
            let mut failures = 0;
            for path in &args.paths {
                match vfs.remove(path) {
                    Ok(()) => println!("Path '{path}' removed"),
                    Err(e) => {
                        println!("Failed to remove '{path}': {e}");
                        failures += 1;
                    }
                }
            }
            failures
        }
        VfsCli::Cp(args) => {
            let mut vfs = Vfs::open(&args.image_file_path)?;
            let mode = CopyMode::from(&args.direction);
            copy::copy(&mut vfs, mode, &args.sources, &args.destination)
        }
        VfsCli::Df(args) => {
            let mut vfs = Vfs::open(&args.image_file_path)?;
            let stats = vfs.stats()?;
            let used_blocks = stats.total_blocks - stats.free_blocks;
            println!(
                "inodes: {} used, {} free, {} total",
                stats.total_inodes - stats.free_inodes,
                stats.free_inodes,
                stats.total_inodes
            );
            println!(
                "data:   {} used, {} free, {} total",
                Byte::from_bytes((used_blocks * stats.block_size) as _).get_appropriate_unit(true),
                Byte::from_bytes((stats.free_blocks * stats.block_size) as _)
                    .get_appropriate_unit(true),
                Byte::from_bytes((stats.total_blocks * stats.block_size) as _)
                    .get_appropriate_unit(true),
            );
            0
        }
    };
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

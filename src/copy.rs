//! copy files into, out of, and inside an image
use std::{
    fs::File,
    io::{self, ErrorKind},
    path::Path,
};

use anyhow::{anyhow, Context};
use log::debug;

use crate::{cli_interface::CopyDirection, fs::Vfs};

const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// host to image
    Up,
    /// image to host
    Down,
    /// image to image
    Internal,
}

impl From<&CopyDirection> for CopyMode {
    fn from(direction: &CopyDirection) -> Self {
        match (direction.up, direction.down) {
            (true, _) => CopyMode::Up,
            (_, true) => CopyMode::Down,
            _ => CopyMode::Internal,
        }
    }
}

/// last component of `source`, the name a copy gets inside a destination directory
fn file_name(source: &str) -> anyhow::Result<&str> {
    source
        .rsplit('/')
        .find(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("'{source}' has no file name"))
}

fn join(dir: &str, name: &str) -> String {
    format!("{}/{name}", dir.trim_end_matches('/'))
}

/// copy the host file `source` to `dest` inside the image
/// # Return
/// the number of bytes copied
pub fn copy_up(vfs: &mut Vfs, source: &Path, dest: &str) -> anyhow::Result<u64> {
    let mut input =
        File::open(source).with_context(|| format!("Failed to open '{}'", source.display()))?;
    let handle = vfs.open_file(dest, true)?;
    let copied = io::copy(&mut input, &mut vfs.file(handle)?);
    vfs.close_file(handle)?;
    copied.map_err(|e| match e.kind() {
        ErrorKind::WriteZero => anyhow!("Failed to write '{dest}': the image is full"),
        _ => anyhow!(e),
    })
}

/// copy `source` inside the image to the host file `dest`
pub fn copy_down(vfs: &mut Vfs, source: &str, dest: &Path) -> anyhow::Result<u64> {
    let handle = vfs.open_file(source, false)?;
    let copied = File::create(dest)
        .with_context(|| format!("Failed to open '{}' for writing", dest.display()))
        .and_then(|mut output| Ok(io::copy(&mut vfs.file(handle)?, &mut output)?));
    vfs.close_file(handle)?;
    copied
}

/// copy `source` to `dest`, both inside the image
pub fn copy_internal(vfs: &mut Vfs, source: &str, dest: &str) -> anyhow::Result<u64> {
    let src = vfs.open_file(source, false)?;
    let dst = match vfs.open_file(dest, true) {
        Ok(dst) => dst,
        Err(e) => {
            vfs.close_file(src)?;
            return Err(e.into());
        }
    };

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut copied = 0u64;
    let result = loop {
        let read = match vfs.file(src).and_then(|mut file| file.read(&mut buffer)) {
            Ok(0) => break Ok(copied),
            Ok(read) => read,
            Err(e) => break Err(e.into()),
        };
        match vfs.file(dst).and_then(|mut file| file.write(&buffer[..read])) {
            Ok(written) => {
                copied += written as u64;
                if written < read {
                    break Err(anyhow!("Failed to write '{dest}': the image is full"));
                }
            }
            Err(e) => break Err(e.into()),
        }
    };
    vfs.close_file(dst)?;
    vfs.close_file(src)?;
    result
}

/// copy every source to `destination` and report each one,
/// several sources (or a destination directory) put the copies inside it
/// # Return
/// the number of failed copies
pub fn copy(vfs: &mut Vfs, mode: CopyMode, sources: &[String], destination: &str) -> usize {
    let into_dir = sources.len() > 1
        || match mode {
            CopyMode::Down => Path::new(destination).is_dir(),
            _ => vfs
                .get_info(destination)
                .map(|info| info.is_directory)
                .unwrap_or(false),
        };

    let mut failures = 0;
    for source in sources {
        let result = file_name(source).and_then(|name| {
            let dest = if into_dir {
                join(destination, name)
            } else {
                destination.to_string()
            };
            let copied = match mode {
                CopyMode::Up => copy_up(vfs, Path::new(source), &dest),
                CopyMode::Down => copy_down(vfs, source, Path::new(&dest)),
                CopyMode::Internal => copy_internal(vfs, source, &dest),
            }?;
            debug!("copied {copied} bytes from {source} to {dest}");
            Ok(dest)
        });
        match result {
            Ok(dest) => println!("Copied '{source}' to '{dest}'"),
            Err(e) => {
                println!("Failed to copy '{source}': {e:#}");
                failures += 1;
            }
        }
    }
    failures
}

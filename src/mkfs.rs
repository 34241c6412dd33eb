//! create our filesystem
use std::path::Path;

use anyhow::anyhow;
use byte_unit::Byte;

use crate::fs::{FsStats, Vfs, VfsError, BLOCK_SIZE, INVALID_INDEX};

/// smallest image holding one data block
pub const MIN_IMAGE_SIZE: u64 = 5 * BLOCK_SIZE;
/// largest image whose blocks are addressable by a 32-bit index
pub const MAX_IMAGE_SIZE: u64 = (INVALID_INDEX as u64 - 1) * BLOCK_SIZE;

/// create a new filesystem,given the path of the image file and the image file size
/// # Params
/// - `image_file_path`: the path of the image file, an existing file is truncated
/// - `file_size`: the size of the image file, rounded up to whole blocks
///
/// # Return
/// an [anyhow::Result] type, holding the usage of the empty filesystem
pub fn mkfs<P>(image_file_path: P, file_size: u64) -> anyhow::Result<FsStats>
where
    P: AsRef<Path>,
{
    let mut vfs = Vfs::format(image_file_path, file_size).map_err(|e| match e {
        VfsError::InvalidCapacity(_) => anyhow!(
            "File size must be between {} and {}",
            Byte::from_bytes(MIN_IMAGE_SIZE as _).get_appropriate_unit(true),
            Byte::from_bytes(MAX_IMAGE_SIZE as _).get_appropriate_unit(true),
        ),
        e => e.into(),
    })?;
    let stats = vfs.stats()?;
    vfs.sync()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::init_test_environment::init_test_environment;

    #[test]
    fn test_mkfs() -> anyhow::Result<()> {
        let (_dir, image) = init_test_environment("new_fs.img");
        let file_size = 64 * 1024 * 1024;
        let stats = mkfs(&image, file_size)?;

        assert_eq!(std::fs::metadata(&image)?.len(), file_size);
        assert_eq!(stats.block_size, BLOCK_SIZE);
        // only the root directory is in use
        assert_eq!(stats.total_inodes, file_size / BLOCK_SIZE);
        assert_eq!(stats.free_inodes, stats.total_inodes - 1);
        assert_eq!(stats.free_blocks, stats.total_blocks);

        let vfs = Vfs::open(&image)?;
        assert!(vfs.get_info("/")?.is_directory);
        Ok(())
    }

    #[test]
    fn test_mkfs_size_limits() -> anyhow::Result<()> {
        let (_dir, image) = init_test_environment("limits.img");
        let err = mkfs(&image, 4 * BLOCK_SIZE).unwrap_err();
        assert!(err.to_string().starts_with("File size must be between"));
        mkfs(&image, MIN_IMAGE_SIZE)?;
        Ok(())
    }
}

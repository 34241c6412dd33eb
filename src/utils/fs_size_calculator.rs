//! This module contains functions to calculate the size of different fs components

use crate::fs::{BLOCK_SIZE, INODE_SIZE, INVALID_INDEX};

/// calculate how many blocks are needed to hold `element_count` bits
/// # Arguments
/// - `element_count`: the number of units tracked by the bitmap
/// # Return
/// the number of blocks of the bitmap
/// # Example
/// ```
/// use vfs::utils::fs_size_calculator::bitmap_blocks;
/// assert_eq!(bitmap_blocks(1), 1);
/// assert_eq!(bitmap_blocks(4096 * 8), 1);
/// assert_eq!(bitmap_blocks(4096 * 8 + 1), 2);
/// ```
pub const fn bitmap_blocks(element_count: u64) -> u64 {
    element_count.div_ceil(BLOCK_SIZE * 8)
}

/// calculate needed Inode Table size in blocks
/// # Arguments
/// - `inode_count`: the number of inodes
/// # Return
/// the number of blocks of the Inode Table
/// # Example
/// ```
/// use vfs::utils::fs_size_calculator::inode_table_blocks;
/// assert_eq!(inode_table_blocks(64), 1);
/// assert_eq!(inode_table_blocks(65), 2);
/// ```
pub const fn inode_table_blocks(inode_count: u64) -> u64 {
    inode_count.div_ceil(BLOCK_SIZE / INODE_SIZE)
}

/// Block layout of an image, derived once from the requested capacity.
///
/// ```text
/// | superblock | inode bitmap | data bitmap | inode table | data blocks |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_count: u32,
    pub inode_bitmap_blocks: u32,
    pub data_bitmap_blocks: u32,
    pub inode_blocks: u32,
    pub first_data_block: u32,
    pub data_blocks: u32,
}

impl Geometry {
    /// caculate the layout of an image able to hold `capacity` bytes
    /// # Return
    /// `None` if the image would have no data block,
    /// or if its blocks can't be addressed by a 32-bit index
    /// # Example
    /// ```
    /// use vfs::utils::fs_size_calculator::Geometry;
    /// let geometry = Geometry::for_capacity(16 * 1024 * 1024).unwrap();
    /// assert_eq!(geometry.block_count, 4096);
    /// assert_eq!(geometry.inode_blocks, 64);
    /// assert_eq!(geometry.first_data_block, 67);
    /// assert_eq!(geometry.data_blocks, 4096 - 67);
    /// ```
    pub fn for_capacity(capacity: u64) -> Option<Self> {
        let block_count = capacity.div_ceil(BLOCK_SIZE);
        if block_count >= INVALID_INDEX as u64 {
            return None;
        }
        Self::for_block_count(block_count as u32)
    }

    pub fn for_block_count(block_count: u32) -> Option<Self> {
        let blocks = block_count as u64;
        // one inode slot per block is the upper bound on objects
        let inode_blocks = inode_table_blocks(blocks);
        let inode_bitmap_blocks = bitmap_blocks(blocks);
        let data_bitmap_blocks = bitmap_blocks(blocks);
        let first_data_block = 1 + inode_bitmap_blocks + data_bitmap_blocks + inode_blocks;
        if first_data_block >= blocks {
            return None;
        }

        Some(Self {
            block_count,
            inode_bitmap_blocks: inode_bitmap_blocks as u32,
            data_bitmap_blocks: data_bitmap_blocks as u32,
            inode_blocks: inode_blocks as u32,
            first_data_block: first_data_block as u32,
            data_blocks: (blocks - first_data_block) as u32,
        })
    }

    /// first block of the inode bitmap
    #[inline]
    pub const fn inode_bitmap_start(&self) -> u32 {
        1
    }

    /// first block of the data block bitmap
    #[inline]
    pub const fn data_bitmap_start(&self) -> u32 {
        1 + self.inode_bitmap_blocks
    }

    /// first block of the inode table
    #[inline]
    pub const fn inode_table_start(&self) -> u32 {
        1 + self.inode_bitmap_blocks + self.data_bitmap_blocks
    }

    /// number of inode slots, also the bit length of the inode bitmap
    #[inline]
    pub const fn inode_count(&self) -> u32 {
        self.block_count
    }

    /// size of the image file in bytes
    #[inline]
    pub const fn image_size(&self) -> u64 {
        self.block_count as u64 * BLOCK_SIZE
    }
}

use serde::{Deserialize, Serialize};

use crate::utils::{
    digest,
    fs_size_calculator::Geometry,
    time_util::{self, *},
    traits::{DigestInSelf, SerializeAndDigest},
};

use super::{Result, VfsError, BLOCK_SIZE, FS_MAGIC};

/// The superblock of this filesystem, stored at block 0
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SuperBlock {
    /// magic number, always the first 4 bytes of the image
    pub magic: [u8; 4],
    /// total number of blocks
    pub block_count: u32,
    /// total image size in bytes
    pub vfs_size: u64,
    /// blocks holding the inode table
    pub inode_blocks: u32,
    pub inode_bitmap_blocks: u32,
    pub data_bitmap_blocks: u32,
    /// index of the first data block
    pub first_data_block: u32,
    pub data_blocks: u32,
    pub created_at: TimeDurationStruct,
    pub last_mounted_at: Option<TimeDurationStruct>,
    /// to verify the integrity of this superblock
    pub digest: [u8; 32],
}

impl SuperBlock {
    pub fn new(geometry: &Geometry) -> Self {
        let mut superblock = Self {
            magic: FS_MAGIC,
            block_count: geometry.block_count,
            vfs_size: geometry.image_size(),
            inode_blocks: geometry.inode_blocks,
            inode_bitmap_blocks: geometry.inode_bitmap_blocks,
            data_bitmap_blocks: geometry.data_bitmap_blocks,
            first_data_block: geometry.first_data_block,
            data_blocks: geometry.data_blocks,
            created_at: time_util::now(),
            last_mounted_at: None,
            digest: [0u8; 32],
        };
        superblock.digest();
        superblock
    }

    /// the layout recorded in this superblock
    pub fn geometry(&self) -> Geometry {
        Geometry {
            block_count: self.block_count,
            inode_bitmap_blocks: self.inode_bitmap_blocks,
            data_bitmap_blocks: self.data_bitmap_blocks,
            inode_blocks: self.inode_blocks,
            first_data_block: self.first_data_block,
            data_blocks: self.data_blocks,
        }
    }

    /// check the recorded layout against the one derived from the block count
    pub fn validate(&self, image_len: u64) -> Result<()> {
        if self.magic != FS_MAGIC {
            return Err(VfsError::BadImage("missing `vfs!` signature".into()));
        }
        let expected = Geometry::for_block_count(self.block_count)
            .ok_or_else(|| VfsError::BadImage(format!("bad block count {}", self.block_count)))?;
        if expected != self.geometry() || self.vfs_size != expected.image_size() {
            return Err(VfsError::BadImage(format!(
                "superblock layout {:?} does not match block count {}",
                self.geometry(),
                self.block_count
            )));
        }
        if image_len < self.block_count as u64 * BLOCK_SIZE {
            return Err(VfsError::BadImage(format!(
                "image holds {image_len} bytes, superblock needs {}",
                self.vfs_size
            )));
        }
        Ok(())
    }

    pub fn update_last_mounted_at(&mut self) {
        self.last_mounted_at = Some(time_util::now());
    }
}

impl DigestInSelf for SuperBlock {
    fn digest(&mut self) {
        self.digest = [0u8; 32];
        self.digest = digest::digest(&*self).unwrap_or_default();
    }

    fn verify_digest(&mut self) -> bool {
        // get digest from itself
        let digest = self.digest;
        // clear the digest from struct
        self.digest = [0u8; 32];
        // calulate the digest
        let digest2 = digest::digest(&*self).unwrap_or_default();
        // restore the stored digest
        self.digest = digest;
        digest == digest2
    }
}

impl SerializeAndDigest for SuperBlock {}

//! what does our filesystem look like in the image file
use std::{io::ErrorKind, path::Path};

use log::{debug, info, warn};

use crate::{
    image_file::ImageFile,
    utils::{
        fs_size_calculator::Geometry,
        traits::{FixedRecord, SerializeAndDigest},
    },
};

use super::{
    bitmap::Bitmap, FileKind, FsStats, Inode, Result, SuperBlock, VfsError, BLOCK_SIZE,
    FS_MAGIC, INODE_SIZE, INVALID_INDEX, POINTERS_PER_BLOCK, ROOT_INODE,
};

/// it has the following layout:
/// - superblock
/// - inode bitmap
/// - data block bitmap
/// - inode table
/// - data blocks
#[derive(Debug)]
pub(crate) struct Volume {
    /// image file handle to operate underlying image file
    image: ImageFile,
    /// the superblock of this filesystem
    superblock: SuperBlock,
    geometry: Geometry,
}

impl Volume {
    /// create a new filesystem on `image_path` able to hold `capacity` bytes
    /// # Params
    /// - `image_path`: the path of the image file, created or truncated
    /// - `capacity`: requested image size, rounded up to whole blocks
    pub fn format<P>(image_path: P, capacity: u64) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let geometry =
            Geometry::for_capacity(capacity).ok_or(VfsError::InvalidCapacity(capacity))?;
        let image = ImageFile::create(image_path.as_ref(), geometry.image_size())?;
        let mut volume = Self {
            image,
            superblock: SuperBlock::new(&geometry),
            geometry,
        };
        volume.save_superblock()?;
        volume.create_root()?;
        info!(
            "formatted {}: {} blocks, {} inodes, first data block {}",
            image_path.as_ref().display(),
            geometry.block_count,
            geometry.inode_count(),
            geometry.first_data_block
        );
        Ok(volume)
    }

    /// attach to an existing image, verifying the superblock
    pub fn mount<P>(image_path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let image = ImageFile::open(image_path.as_ref()).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => VfsError::BadImage(e.to_string()),
            _ => VfsError::Io(e),
        })?;
        if image.len() < BLOCK_SIZE {
            return Err(VfsError::BadImage(format!(
                "image of {} bytes is smaller than one block",
                image.len()
            )));
        }
        let block0 = image.region(0, BLOCK_SIZE as usize)?;
        if block0[..FS_MAGIC.len()] != FS_MAGIC {
            return Err(VfsError::BadImage("missing `vfs!` signature".into()));
        }
        let mut superblock = SuperBlock::deserialize(block0)?;
        superblock.validate(image.len())?;
        superblock.update_last_mounted_at();

        let mut volume = Self {
            image,
            geometry: superblock.geometry(),
            superblock,
        };
        if !volume.read_inode(ROOT_INODE)?.is_dir() {
            return Err(VfsError::BadImage("root inode is not a directory".into()));
        }
        volume.save_superblock()?;
        info!(
            "mounted {}: {} blocks, created at {}s",
            image_path.as_ref().display(),
            volume.geometry.block_count,
            volume.superblock.created_at.sec
        );
        Ok(volume)
    }

    /// reserve inode 0 and store an empty root directory "/" in it
    fn create_root(&mut self) -> Result<()> {
        let index = self.reserve_inode()?.ok_or(VfsError::NoSpace)?;
        if index != ROOT_INODE {
            return Err(VfsError::BadImage(format!(
                "root inode index must be {ROOT_INODE}, not {index}"
            )));
        }
        self.write_inode(ROOT_INODE, &Inode::new(FileKind::Directory))
    }

    fn save_superblock(&mut self) -> Result<()> {
        let bytes = self.superblock.serialize()?;
        assert!(bytes.len() as u64 <= BLOCK_SIZE, "superblock overflows block 0");
        self.image.write_at(0, &bytes)?;
        Ok(())
    }

    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// write everything back to the image file
    pub fn sync(&mut self) -> Result<()> {
        self.image.flush()?;
        Ok(())
    }
}

/// bitmap allocator, all mutations land in the mapped image at once
impl Volume {
    fn bitmap(&mut self, start_block: u32, blocks: u32, bits: u32) -> Result<Bitmap<'_>> {
        let bytes = self.image.region_mut(
            start_block as u64 * BLOCK_SIZE,
            (blocks as u64 * BLOCK_SIZE) as usize,
        )?;
        Ok(Bitmap::new(bytes, bits as usize))
    }

    fn inode_bitmap(&mut self) -> Result<Bitmap<'_>> {
        let g = self.geometry;
        self.bitmap(g.inode_bitmap_start(), g.inode_bitmap_blocks, g.inode_count())
    }

    fn data_bitmap(&mut self) -> Result<Bitmap<'_>> {
        let g = self.geometry;
        self.bitmap(g.data_bitmap_start(), g.data_bitmap_blocks, g.data_blocks)
    }

    /// # Return
    /// the reserved inode index, `None` if every inode is in use
    pub fn reserve_inode(&mut self) -> Result<Option<u32>> {
        let index = self.inode_bitmap()?.reserve();
        match index {
            Some(index) => debug!("reserved inode {index}"),
            None => warn!("no free inode left"),
        }
        Ok(index)
    }

    pub fn release_inode(&mut self, index: u32) -> Result<()> {
        assert_ne!(index, ROOT_INODE, "the root inode is never released");
        self.inode_bitmap()?.release(index);
        debug!("released inode {index}");
        Ok(())
    }

    /// # Return
    /// the physical index of the reserved data block, `None` if the image is full
    pub fn reserve_block(&mut self) -> Result<Option<u32>> {
        let first_data_block = self.geometry.first_data_block;
        let block = self.data_bitmap()?.reserve().map(|i| first_data_block + i);
        if block.is_none() {
            warn!("no free data block left");
        }
        Ok(block)
    }

    pub fn release_block(&mut self, block: u32) -> Result<()> {
        self.check_data_block(block);
        let first_data_block = self.geometry.first_data_block;
        self.data_bitmap()?.release(block - first_data_block);
        Ok(())
    }

    pub fn stats(&mut self) -> Result<FsStats> {
        let free_inodes = self.inode_bitmap()?.count_free() as u64;
        let free_blocks = self.data_bitmap()?.count_free() as u64;
        Ok(FsStats {
            block_size: BLOCK_SIZE,
            total_inodes: self.geometry.inode_count() as u64,
            free_inodes,
            total_blocks: self.geometry.data_blocks as u64,
            free_blocks,
        })
    }
}

/// [Inode] table operations
impl Volume {
    fn inode_offset(&self, index: u32) -> u64 {
        assert!(
            index < self.geometry.inode_count(),
            "inode {index} is outside the inode table"
        );
        self.geometry.inode_table_start() as u64 * BLOCK_SIZE + index as u64 * INODE_SIZE
    }

    pub fn read_inode(&self, index: u32) -> Result<Inode> {
        let record = self
            .image
            .region(self.inode_offset(index), INODE_SIZE as usize)?;
        Inode::from_record(record)
    }

    pub fn write_inode(&mut self, index: u32, inode: &Inode) -> Result<()> {
        let record = inode.to_record()?;
        self.image.write_at(self.inode_offset(index), &record)?;
        Ok(())
    }
}

/// data block operations
impl Volume {
    fn check_data_block(&self, block: u32) {
        assert!(
            block >= self.geometry.first_data_block && block < self.geometry.block_count,
            "block {block} is not a data block"
        );
    }

    fn block_offset(&self, block: u32, offset: usize, len: usize) -> u64 {
        self.check_data_block(block);
        assert!(
            offset + len <= BLOCK_SIZE as usize,
            "{len} bytes at {offset} cross the end of block {block}"
        );
        block as u64 * BLOCK_SIZE + offset as u64
    }

    pub fn read_block_at(&self, block: u32, offset: usize, buf: &mut [u8]) -> Result<()> {
        let position = self.block_offset(block, offset, buf.len());
        self.image.read_at(position, buf)?;
        Ok(())
    }

    pub fn write_block_at(&mut self, block: u32, offset: usize, data: &[u8]) -> Result<()> {
        let position = self.block_offset(block, offset, data.len());
        self.image.write_at(position, data)?;
        Ok(())
    }

    /// set every byte of `block` to `byte`
    pub fn fill_block(&mut self, block: u32, byte: u8) -> Result<()> {
        let position = self.block_offset(block, 0, BLOCK_SIZE as usize);
        self.image.fill(position, BLOCK_SIZE as usize, byte)?;
        Ok(())
    }

    pub fn read_pointer(&self, block: u32, index: u64) -> Result<u32> {
        assert!(index < POINTERS_PER_BLOCK);
        let mut bytes = [0u8; 4];
        self.read_block_at(block, index as usize * 4, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn write_pointer(&mut self, block: u32, index: u64, pointer: u32) -> Result<()> {
        assert!(index < POINTERS_PER_BLOCK);
        self.write_block_at(block, index as usize * 4, &pointer.to_le_bytes())
    }

    /// every pointer stored in `block`
    pub fn read_pointer_block(&self, block: u32) -> Result<Vec<u32>> {
        let position = self.block_offset(block, 0, BLOCK_SIZE as usize);
        let bytes = self.image.region(position, BLOCK_SIZE as usize)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|p| u32::from_le_bytes([p[0], p[1], p[2], p[3]]))
            .collect())
    }

    /// store `pointers` at the start of `block`, the rest of it invalid
    pub fn write_pointer_block(&mut self, block: u32, pointers: &[u32]) -> Result<()> {
        assert!(pointers.len() as u64 <= POINTERS_PER_BLOCK);
        let mut bytes = vec![0xff; BLOCK_SIZE as usize];
        for (slot, pointer) in bytes.chunks_exact_mut(4).zip(pointers) {
            slot.copy_from_slice(&pointer.to_le_bytes());
        }
        debug_assert_eq!(u32::from_le_bytes([0xff; 4]), INVALID_INDEX);
        self.write_block_at(block, 0, &bytes)
    }
}

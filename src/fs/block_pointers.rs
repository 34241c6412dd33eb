//! map logical blocks of an inode to physical data blocks
//!
//! Depending on [PointerDepth], every inode slot addresses a data block,
//! a block of data block pointers or a block of pointers to pointer blocks.
//! Pointer blocks are created full of [INVALID_INDEX] and data blocks
//! are zero-filled when first reserved.
use log::{debug, warn};

use super::{
    Inode, PointerDepth, Result, Volume, INODE_POINTERS, INVALID_INDEX, POINTERS_PER_BLOCK,
};

/// index inside the pointer block `level` steps above the data block
#[inline]
fn pointer_index(logical: u64, level: u32) -> u64 {
    (logical / POINTERS_PER_BLOCK.pow(level)) % POINTERS_PER_BLOCK
}

impl Volume {
    /// find the physical block holding logical block `logical` of `inode`
    /// # Return
    /// `None` if the block was never written
    pub fn lookup_block(&self, inode: &Inode, logical: u64) -> Result<Option<u32>> {
        if logical >= inode.depth.capacity() {
            return Ok(None);
        }
        let slot = (logical / inode.depth.blocks_per_slot()) as usize;
        let mut block = inode.blocks[slot];
        for level in (0..inode.depth.levels()).rev() {
            if block == INVALID_INDEX {
                return Ok(None);
            }
            block = self.read_pointer(block, pointer_index(logical, level))?;
        }
        Ok((block != INVALID_INDEX).then_some(block))
    }

    /// like [Volume::lookup_block], reserving whatever is missing on the way,
    /// the inode's pointers may change and must be saved by the caller
    /// # Return
    /// `None` if the image ran out of blocks or the file can't grow any further
    pub fn map_block(&mut self, inode: &mut Inode, logical: u64) -> Result<Option<u32>> {
        // out of reach at any depth, leave the inode as it is
        if logical >= PointerDepth::DoubleIndirect.capacity() {
            return Ok(None);
        }
        while logical >= inode.depth.capacity() {
            if !self.extend_pointers(inode)? {
                return Ok(None);
            }
        }
        let levels = inode.depth.levels();
        let slot = (logical / inode.depth.blocks_per_slot()) as usize;
        let mut block = inode.blocks[slot];
        if block == INVALID_INDEX {
            let Some(reserved) = self.reserve_initialized(levels > 0)? else {
                return Ok(None);
            };
            inode.blocks[slot] = reserved;
            block = reserved;
        }

        for level in (0..levels).rev() {
            let index = pointer_index(logical, level);
            let mut next = self.read_pointer(block, index)?;
            if next == INVALID_INDEX {
                let Some(reserved) = self.reserve_initialized(level > 0)? else {
                    return Ok(None);
                };
                self.write_pointer(block, index, reserved)?;
                next = reserved;
            }
            block = next;
        }
        Ok(Some(block))
    }

    /// reserve a pointer block full of invalid pointers, or a zeroed data block
    fn reserve_initialized(&mut self, pointer_block: bool) -> Result<Option<u32>> {
        let Some(block) = self.reserve_block()? else {
            return Ok(None);
        };
        if pointer_block {
            self.write_pointer_block(block, &[])?;
        } else {
            self.fill_block(block, 0)?;
        }
        Ok(Some(block))
    }

    /// move the inode one level of indirection deeper
    ///
    /// The inode's current pointers are copied into a new pointer block
    /// which becomes the only slot in use. The inode is left untouched
    /// unless the new block was reserved and written.
    /// # Return
    /// `false` if the inode is double indirect already or no block is free
    pub fn extend_pointers(&mut self, inode: &mut Inode) -> Result<bool> {
        let Some(grown) = inode.depth.grown() else {
            warn!(
                "inode is double indirect already, can't grow past {} blocks",
                inode.depth.capacity()
            );
            return Ok(false);
        };
        let Some(block) = self.reserve_block()? else {
            return Ok(false);
        };
        if let Err(e) = self.write_pointer_block(block, &inode.blocks) {
            self.release_block(block)?;
            return Err(e);
        }

        inode.blocks = [INVALID_INDEX; INODE_POINTERS];
        inode.blocks[0] = block;
        inode.depth = grown;
        debug!("grew inode to {grown:?} through pointer block {block}");
        Ok(true)
    }

    /// every pointer and data block reachable from `inode`
    pub fn blocks_map(&self, inode: &Inode) -> Result<Vec<u32>> {
        let mut blocks = Vec::new();
        for block in inode.used_blocks() {
            self.collect_blocks(block, inode.depth.levels(), &mut blocks)?;
        }
        Ok(blocks)
    }

    fn collect_blocks(&self, block: u32, levels: u32, blocks: &mut Vec<u32>) -> Result<()> {
        blocks.push(block);
        if levels == 0 {
            return Ok(());
        }
        for child in self.read_pointer_block(block)? {
            if child != INVALID_INDEX {
                self.collect_blocks(child, levels - 1, blocks)?;
            }
        }
        Ok(())
    }

    /// release every block of `inode` and reset it to an empty direct inode
    pub fn release_blocks(&mut self, inode: &mut Inode) -> Result<()> {
        let blocks = self.blocks_map(inode)?;
        for block in &blocks {
            self.release_block(*block)?;
        }
        debug!("released {} blocks of a {:?} inode", blocks.len(), inode.depth);
        inode.depth = PointerDepth::Direct;
        inode.size = 0;
        inode.blocks = [INVALID_INDEX; INODE_POINTERS];
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use crate::utils::traits::FixedRecord;

use super::{
    filekind::FileKind, DIR_ENTRY_SIZE, INODE_POINTERS, INODE_SIZE, INVALID_INDEX,
    POINTERS_PER_BLOCK,
};

/// How the inode's pointer slots are interpreted.
///
/// Depth only ever moves forward, through [PointerDepth::grown].
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum PointerDepth {
    /// slots point at data blocks
    #[default]
    Direct,
    /// slots point at blocks of data block pointers
    Indirect,
    /// slots point at blocks of pointers to pointer blocks
    DoubleIndirect,
}

impl PointerDepth {
    /// number of pointer blocks between a slot and a data block
    pub const fn levels(self) -> u32 {
        match self {
            PointerDepth::Direct => 0,
            PointerDepth::Indirect => 1,
            PointerDepth::DoubleIndirect => 2,
        }
    }

    /// the next depth, `None` once double indirect
    pub const fn grown(self) -> Option<Self> {
        match self {
            PointerDepth::Direct => Some(PointerDepth::Indirect),
            PointerDepth::Indirect => Some(PointerDepth::DoubleIndirect),
            PointerDepth::DoubleIndirect => None,
        }
    }

    /// logical blocks addressable by one inode slot
    pub const fn blocks_per_slot(self) -> u64 {
        POINTERS_PER_BLOCK.pow(self.levels())
    }

    /// logical blocks addressable at this depth
    /// # Example
    /// ```
    /// use vfs::PointerDepth;
    /// assert_eq!(PointerDepth::Direct.capacity(), 5);
    /// assert_eq!(PointerDepth::Indirect.capacity(), 5 * 1024);
    /// assert_eq!(PointerDepth::DoubleIndirect.capacity(), 5 * 1024 * 1024);
    /// ```
    pub const fn capacity(self) -> u64 {
        INODE_POINTERS as u64 * self.blocks_per_slot()
    }
}

/// On-disk metadata of one file or directory
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub file_kind: FileKind,
    pub depth: PointerDepth,
    /// bytes for a regular file, entry count ("usage") for a directory
    pub size: u64,
    pub blocks: [u32; INODE_POINTERS],
}

impl Default for Inode {
    fn default() -> Self {
        Self::new(FileKind::RegularFile)
    }
}

impl FixedRecord for Inode {
    const RECORD_SIZE: usize = INODE_SIZE as usize;
}

impl Inode {
    pub fn new(file_kind: impl Into<FileKind>) -> Self {
        Inode {
            file_kind: file_kind.into(),
            depth: PointerDepth::Direct,
            size: 0,
            blocks: [INVALID_INDEX; INODE_POINTERS],
        }
    }
}

/// This block is about file metadata operations
impl Inode {
    pub fn is_regular_file(&self) -> bool {
        self.file_kind == FileKind::RegularFile
    }

    pub fn is_dir(&self) -> bool {
        self.file_kind == FileKind::Directory
    }

    /// length of the inode's byte stream
    pub fn byte_len(&self) -> u64 {
        match self.file_kind {
            FileKind::RegularFile => self.size,
            FileKind::Directory => self.size * DIR_ENTRY_SIZE,
        }
    }

    /// extend a regular file to at least `len` bytes,
    /// directories keep their entry count untouched
    pub fn adjust_size(&mut self, len: u64) {
        if self.is_regular_file() {
            self.size = self.size.max(len);
        }
    }

    /// pointer slots currently in use
    pub fn used_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.blocks.iter().copied().filter(|b| *b != INVALID_INDEX)
    }
}

//! our custom filesystem
pub mod bitmap;
pub mod block_pointers;
pub mod directory;
pub mod error;
pub mod file;
pub mod filekind;
pub mod fs_api_impl;
pub mod fs_layout;
pub mod inode;
pub mod superblock;
pub use directory::*;
pub use error::*;
pub use file::*;
pub use filekind::*;
pub use fs_api_impl::*;
pub(crate) use fs_layout::*;
pub use inode::*;
pub use superblock::*;

/// signature stored in the first bytes of block 0
pub const FS_MAGIC: [u8; 4] = *b"vfs!";
pub const BLOCK_SIZE: u64 = 4096;
pub const INODE_SIZE: u64 = 64;
/// pointer slots stored inline in every inode
pub const INODE_POINTERS: usize = 5;
pub const DIR_NAME_LEN: usize = 252;
pub const DIR_ENTRY_SIZE: u64 = 4 + DIR_NAME_LEN as u64;
/// block indices stored in one pointer block
pub const POINTERS_PER_BLOCK: u64 = BLOCK_SIZE / 4;
/// never a legal block or inode index
pub const INVALID_INDEX: u32 = u32::MAX;
pub const ROOT_INODE: u32 = 0;

use std::{borrow::Cow, fmt};

use super::{InodeFile, Result, VfsError, Volume, DIR_ENTRY_SIZE, DIR_NAME_LEN};

/// one name inside a directory, stored as a fixed 256-byte record
///
/// ```text
/// | inode id (u32, little-endian) | name, zero-padded to 252 bytes |
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct DirEntry {
    inode_id: u32,
    name: [u8; DIR_NAME_LEN],
}

impl DirEntry {
    pub const SIZE: usize = DIR_ENTRY_SIZE as usize;

    /// # Errors
    /// [VfsError::InvalidName] unless `name` is 1 to 252 bytes without NUL
    pub fn new(name: &str, inode_id: u32) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > DIR_NAME_LEN || bytes.contains(&0) {
            return Err(VfsError::InvalidName(name.into()));
        }
        let mut buf = [0u8; DIR_NAME_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            inode_id,
            name: buf,
        })
    }

    #[inline]
    pub fn inode_id(&self) -> u32 {
        self.inode_id
    }

    /// the name without its zero padding
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(DIR_NAME_LEN);
        &self.name[..len]
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..4].copy_from_slice(&self.inode_id.to_le_bytes());
        bytes[4..].copy_from_slice(&self.name);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut name = [0u8; DIR_NAME_LEN];
        name.copy_from_slice(&bytes[4..]);
        Self {
            inode_id: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            name,
        }
    }
}

impl fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntry")
            .field("inode_id", &self.inode_id)
            .field("name", &self.name())
            .finish()
    }
}

/// A directory: an inode whose content is a dense array of [DirEntry],
/// its size field counts the entries.
#[derive(Debug)]
pub(crate) struct Directory {
    file: InodeFile,
}

impl Directory {
    pub fn open(volume: &Volume, id: u32) -> Result<Self> {
        let file = InodeFile::open(volume, id)?;
        if !file.inode.is_dir() {
            return Err(VfsError::NotADirectory(format!("inode {id}")));
        }
        Ok(Self { file })
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.file.id
    }

    /// number of entries
    #[inline]
    pub fn len(&self) -> u64 {
        self.file.inode.size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry(&self, volume: &Volume, slot: u64) -> Result<DirEntry> {
        let mut bytes = [0u8; DirEntry::SIZE];
        let read = self.file.read_at(volume, slot * DIR_ENTRY_SIZE, &mut bytes)?;
        if read != DirEntry::SIZE {
            return Err(VfsError::BadImage(format!(
                "directory {} lost entry {slot}",
                self.id()
            )));
        }
        Ok(DirEntry::from_bytes(&bytes))
    }

    /// entries in storage order
    pub fn entries(&self, volume: &Volume) -> Result<Vec<DirEntry>> {
        (0..self.len()).map(|slot| self.entry(volume, slot)).collect()
    }

    /// scan the entries for `name`
    /// # Return
    /// the slot and entry named `name`, if any
    pub fn find(&self, volume: &Volume, name: &str) -> Result<Option<(u64, DirEntry)>> {
        for slot in 0..self.len() {
            let entry = self.entry(volume, slot)?;
            if entry.name_bytes() == name.as_bytes() {
                return Ok(Some((slot, entry)));
            }
        }
        Ok(None)
    }

    /// append `entry` after the last one
    pub fn add(&mut self, volume: &mut Volume, entry: &DirEntry) -> Result<()> {
        let offset = self.len() * DIR_ENTRY_SIZE;
        let written = self.file.write_at(volume, offset, &entry.to_bytes())?;
        if written != DirEntry::SIZE {
            // keep whatever pointer blocks were reserved reachable
            self.file.flush(volume)?;
            return Err(VfsError::NoSpace);
        }
        self.file.inode.size += 1;
        self.file.flush(volume)
    }

    /// remove the entry in `slot`, the last entry takes its place
    pub fn remove(&mut self, volume: &mut Volume, slot: u64) -> Result<DirEntry> {
        assert!(slot < self.len(), "directory {} has no slot {slot}", self.id());
        let removed = self.entry(volume, slot)?;
        let last = self.len() - 1;
        if slot != last {
            let moved = self.entry(volume, last)?;
            let written = self
                .file
                .write_at(volume, slot * DIR_ENTRY_SIZE, &moved.to_bytes())?;
            debug_assert_eq!(written, DirEntry::SIZE);
        }
        self.file.inode.size = last;
        self.file.flush(volume)?;
        Ok(removed)
    }
}

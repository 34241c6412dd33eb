//! the public face of the filesystem: a [Vfs] session over one image,
//! with path based namespace operations and a registry of open files
use std::{collections::BTreeMap, fmt, path::Path};

use log::{debug, error, warn};
use smallvec::SmallVec;

use super::{
    DirEntry, Directory, FileKind, FileMut, Inode, InodeFile, Result, VfsError, Volume,
    ROOT_INODE,
};

/// token for a file opened through [Vfs::open_file], never reused in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileHandle(pub u64);

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// what [Vfs::get_info] knows about a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    pub is_directory: bool,
    /// entry count of a directory, byte length of a file
    pub size: u64,
}

/// usage of an image, as reported by [Vfs::stats]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub block_size: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
    /// data blocks only, metadata blocks are not counted
    pub total_blocks: u64,
    pub free_blocks: u64,
}

/// where a path leads
#[derive(Debug)]
struct Resolved<'p> {
    /// the inode the path names, if it exists
    target: Option<u32>,
    /// the directory holding the last segment, if every ancestor exists
    parent: Option<u32>,
    /// the last segment, `None` for the root
    name: Option<&'p str>,
    /// directories walked through, from the root down to the parent
    ancestors: SmallVec<[u32; 8]>,
}

/// split `path` on `/`, dropping empty segments
fn split_path(path: &str) -> SmallVec<[&str; 8]> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A filesystem session, owning the image for as long as it lives.
///
/// Files still open when the session is dropped are flushed, then the image
/// is synced.
#[derive(Debug)]
pub struct Vfs {
    volume: Volume,
    open_files: BTreeMap<FileHandle, InodeFile>,
    next_handle: u64,
}

impl Vfs {
    fn with_volume(volume: Volume) -> Self {
        Self {
            volume,
            open_files: BTreeMap::new(),
            next_handle: 0,
        }
    }

    /// create (or truncate) the image at `image_path` with room for `size` bytes
    /// and put an empty filesystem on it
    pub fn format<P>(image_path: P, size: u64) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Volume::format(image_path, size).map(Self::with_volume)
    }

    /// open an image created by [Vfs::format]
    pub fn open<P>(image_path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Volume::mount(image_path).map(Self::with_volume)
    }

    pub fn stats(&mut self) -> Result<FsStats> {
        self.volume.stats()
    }

    /// flush every open file's metadata and write the image back to disk
    pub fn sync(&mut self) -> Result<()> {
        for file in self.open_files.values() {
            file.flush(&mut self.volume)?;
        }
        self.volume.sync()
    }
}

/// path resolution
impl Vfs {
    fn lookup(&self, dir: u32, name: &str) -> Result<Option<u32>> {
        let dir = Directory::open(&self.volume, dir)?;
        Ok(dir
            .find(&self.volume, name)?
            .map(|(_, entry)| entry.inode_id()))
    }

    fn resolve<'p>(&self, path: &'p str) -> Result<Resolved<'p>> {
        let segments = split_path(path);
        let mut ancestors = SmallVec::new();
        let Some((&name, dirs)) = segments.split_last() else {
            return Ok(Resolved {
                target: Some(ROOT_INODE),
                parent: None,
                name: None,
                ancestors,
            });
        };

        let mut current = ROOT_INODE;
        ancestors.push(current);
        for segment in dirs {
            match self.lookup(current, segment)? {
                Some(id) if self.volume.read_inode(id)?.is_dir() => {
                    ancestors.push(id);
                    current = id;
                }
                // a missing ancestor, or a file used as one
                _ => {
                    return Ok(Resolved {
                        target: None,
                        parent: None,
                        name: Some(name),
                        ancestors,
                    })
                }
            }
        }
        Ok(Resolved {
            target: self.lookup(current, name)?,
            parent: Some(current),
            name: Some(name),
            ancestors,
        })
    }

    fn open_dir(&self, id: u32, path: &str) -> Result<Directory> {
        Directory::open(&self.volume, id).map_err(|e| match e {
            VfsError::NotADirectory(_) => VfsError::NotADirectory(path.into()),
            e => e,
        })
    }

    /// reserve an inode of `kind` and link it into the parent of `resolved`
    fn create_node(&mut self, resolved: &Resolved, path: &str, kind: FileKind) -> Result<u32> {
        let (Some(parent), Some(name)) = (resolved.parent, resolved.name) else {
            return Err(VfsError::NotFound(path.into()));
        };
        let id = self.volume.reserve_inode()?.ok_or(VfsError::NoSpace)?;
        if let Err(e) = self.link_new(parent, name, id, kind) {
            self.volume.release_inode(id)?;
            return Err(e);
        }
        debug!("created {kind:?} {path} as inode {id}");
        Ok(id)
    }

    fn link_new(&mut self, parent: u32, name: &str, id: u32, kind: FileKind) -> Result<()> {
        let entry = DirEntry::new(name, id)?;
        self.volume.write_inode(id, &Inode::new(kind))?;
        Directory::open(&self.volume, parent)?.add(&mut self.volume, &entry)
    }
}

/// open files
impl Vfs {
    /// open the file at `path`, or create it when `create` is set
    /// # Errors
    /// - [VfsError::AlreadyExists] if `create` is set and `path` exists
    /// - [VfsError::NotFound] if `path` (or with `create`, its parent) is missing
    /// - [VfsError::IsADirectory] if `path` is a directory
    pub fn open_file(&mut self, path: &str, create: bool) -> Result<FileHandle> {
        let resolved = self.resolve(path)?;
        let id = match (resolved.target, create) {
            (Some(_), true) => return Err(VfsError::AlreadyExists(path.into())),
            (None, false) => return Err(VfsError::NotFound(path.into())),
            (Some(id), false) => id,
            (None, true) => self.create_node(&resolved, path, FileKind::RegularFile)?,
        };
        let file = InodeFile::open(&self.volume, id)?;
        if file.inode.is_dir() {
            return Err(VfsError::IsADirectory(path.into()));
        }

        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;
        self.open_files.insert(handle, file);
        debug!("opened {path} (inode {id}) as {handle}");
        Ok(handle)
    }

    /// flush the file behind `handle` and forget it
    pub fn close_file(&mut self, handle: FileHandle) -> Result<()> {
        let file = self
            .open_files
            .remove(&handle)
            .ok_or(VfsError::NotOpen(handle))?;
        debug!("closing {handle} (inode {})", file.id);
        file.flush(&mut self.volume)
    }

    /// borrow an open file for reading, writing and seeking
    pub fn file(&mut self, handle: FileHandle) -> Result<FileMut<'_>> {
        let file = self
            .open_files
            .get_mut(&handle)
            .ok_or(VfsError::NotOpen(handle))?;
        Ok(FileMut::new(&mut self.volume, file))
    }
}

/// namespace operations
impl Vfs {
    pub fn create_dir(&mut self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        if resolved.target.is_some() {
            return Err(VfsError::AlreadyExists(path.into()));
        }
        self.create_node(&resolved, path, FileKind::Directory)
            .map(|_| ())
    }

    /// move `src` to `dest`, which must not exist yet
    pub fn rename(&mut self, src: &str, dest: &str) -> Result<()> {
        let from = self.resolve(src)?;
        let id = from.target.ok_or_else(|| VfsError::NotFound(src.into()))?;
        let (Some(src_parent), Some(src_name)) = (from.parent, from.name) else {
            return Err(VfsError::InvalidPath(format!("can't move the root directory to {dest}")));
        };

        let to = self.resolve(dest)?;
        if to.target.is_some() {
            return Err(VfsError::AlreadyExists(dest.into()));
        }
        let (Some(dest_parent), Some(dest_name)) = (to.parent, to.name) else {
            return Err(VfsError::NotFound(dest.into()));
        };
        if to.ancestors.contains(&id) {
            return Err(VfsError::InvalidPath(format!("can't move {src} into itself")));
        }

        // link the new name first, the inode is never unreachable
        let entry = DirEntry::new(dest_name, id)?;
        Directory::open(&self.volume, dest_parent)?.add(&mut self.volume, &entry)?;
        let mut parent = Directory::open(&self.volume, src_parent)?;
        let (slot, _) = parent
            .find(&self.volume, src_name)?
            .ok_or_else(|| VfsError::NotFound(src.into()))?;
        parent.remove(&mut self.volume, slot)?;
        debug!("moved {src} (inode {id}) to {dest}");
        Ok(())
    }

    /// remove a file, or an empty directory
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        let id = resolved
            .target
            .ok_or_else(|| VfsError::NotFound(path.into()))?;
        let (Some(parent), Some(name)) = (resolved.parent, resolved.name) else {
            return Err(VfsError::InvalidPath("can't remove the root directory".into()));
        };
        if self.open_files.values().any(|f| f.id == id) {
            return Err(VfsError::Busy(path.into()));
        }
        let mut inode = self.volume.read_inode(id)?;
        if inode.is_dir() && inode.size > 0 {
            return Err(VfsError::NotEmpty(path.into()));
        }

        self.volume.release_blocks(&mut inode)?;
        let mut parent = Directory::open(&self.volume, parent)?;
        let (slot, _) = parent
            .find(&self.volume, name)?
            .ok_or_else(|| VfsError::NotFound(path.into()))?;
        parent.remove(&mut self.volume, slot)?;
        self.volume.write_inode(id, &inode)?;
        self.volume.release_inode(id)?;
        debug!("removed {path} (inode {id})");
        Ok(())
    }

    /// names inside the directory `path`, in storage order
    pub fn list(&self, path: &str) -> Result<Vec<String>> {
        let id = self
            .resolve(path)?
            .target
            .ok_or_else(|| VfsError::NotFound(path.into()))?;
        let dir = self.open_dir(id, path)?;
        Ok(dir
            .entries(&self.volume)?
            .iter()
            .map(|entry| entry.name().into_owned())
            .collect())
    }

    pub fn get_info(&self, path: &str) -> Result<PathInfo> {
        let id = self
            .resolve(path)?
            .target
            .ok_or_else(|| VfsError::NotFound(path.into()))?;
        // open handles may have grown the file since it was last flushed
        let inode = match self
            .open_files
            .values()
            .filter(|f| f.id == id)
            .max_by_key(|f| f.inode.size)
        {
            Some(file) => file.inode.clone(),
            None => self.volume.read_inode(id)?,
        };
        Ok(PathInfo {
            is_directory: inode.is_dir(),
            size: inode.size,
        })
    }
}

impl Drop for Vfs {
    fn drop(&mut self) {
        for (handle, file) in std::mem::take(&mut self.open_files) {
            warn!("{handle} (inode {}) is still open, flushing it", file.id);
            if let Err(e) = file.flush(&mut self.volume) {
                error!("flush {handle} failed: {e}");
            }
        }
        if let Err(e) = self.volume.sync() {
            error!("sync image failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        io::{Seek, SeekFrom, Write},
    };

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{
        fs::{SeekMode, BLOCK_SIZE},
        utils::init_test_environment::init_test_environment,
    };

    const MIB: u64 = 1024 * 1024;

    fn write_file(vfs: &mut Vfs, path: &str, data: &[u8]) -> Result<usize> {
        let handle = vfs.open_file(path, true)?;
        let written = vfs.file(handle)?.write(data)?;
        vfs.close_file(handle)?;
        Ok(written)
    }

    fn read_file(vfs: &mut Vfs, path: &str) -> Result<Vec<u8>> {
        let handle = vfs.open_file(path, false)?;
        let mut data = vec![0u8; vfs.get_info(path)?.size as usize];
        let read = vfs.file(handle)?.read(&mut data)?;
        assert_eq!(read, data.len());
        vfs.close_file(handle)?;
        Ok(data)
    }

    #[test]
    fn test_fresh_image() -> Result<()> {
        let (_dir, image) = init_test_environment("fresh.img");
        let vfs = Vfs::format(&image, 16 * MIB)?;
        assert!(vfs.list("/")?.is_empty());
        assert!(vfs.list("")?.is_empty());
        assert_eq!(
            vfs.get_info("/")?,
            PathInfo {
                is_directory: true,
                size: 0
            }
        );
        Ok(())
    }

    #[test]
    fn test_create_dir_needs_parents() -> Result<()> {
        let (_dir, image) = init_test_environment("mkdir.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        assert!(matches!(vfs.create_dir("a/b/c"), Err(VfsError::NotFound(_))));
        vfs.create_dir("a")?;
        assert!(matches!(vfs.create_dir("a"), Err(VfsError::AlreadyExists(_))));
        assert!(matches!(vfs.create_dir("a/b/c"), Err(VfsError::NotFound(_))));
        vfs.create_dir("a/b")?;
        vfs.create_dir("/a//b/c/")?;
        assert_eq!(vfs.list("a/b")?, ["c"]);
        assert_eq!(vfs.get_info("/a")?.size, 1);
        assert!(matches!(vfs.create_dir("/"), Err(VfsError::AlreadyExists(_))));
        Ok(())
    }

    #[test]
    fn test_open_file_create_rules() -> Result<()> {
        let (_dir, image) = init_test_environment("open.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        assert!(matches!(vfs.open_file("p", false), Err(VfsError::NotFound(_))));
        let handle = vfs.open_file("p", true)?;
        vfs.close_file(handle)?;
        assert!(matches!(vfs.open_file("p", true), Err(VfsError::AlreadyExists(_))));
        assert!(matches!(vfs.open_file("missing/p", true), Err(VfsError::NotFound(_))));

        vfs.create_dir("d")?;
        let free_inodes = vfs.stats()?.free_inodes;
        assert!(matches!(vfs.open_file("d", false), Err(VfsError::IsADirectory(_))));
        assert_eq!(vfs.stats()?.free_inodes, free_inodes);

        // a file can't stand in for a directory
        assert!(matches!(vfs.open_file("p/q", true), Err(VfsError::NotFound(_))));
        assert!(matches!(vfs.list("p"), Err(VfsError::NotADirectory(_))));
        assert!(matches!(
            vfs.open_file(&"x".repeat(300), true),
            Err(VfsError::InvalidName(_))
        ));
        assert_eq!(vfs.stats()?.free_inodes, free_inodes);
        Ok(())
    }

    #[test]
    fn test_handles_are_checked() -> Result<()> {
        let (_dir, image) = init_test_environment("handles.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        let first = vfs.open_file("f", true)?;
        vfs.close_file(first)?;
        assert!(matches!(vfs.close_file(first), Err(VfsError::NotOpen(_))));
        assert!(vfs.file(first).is_err());

        // handles are never reused
        let second = vfs.open_file("f", false)?;
        assert_ne!(first, second);
        assert!(matches!(vfs.close_file(FileHandle(99)), Err(VfsError::NotOpen(_))));
        vfs.close_file(second)?;
        Ok(())
    }

    #[test]
    fn test_write_read_and_seek() -> Result<()> {
        let (_dir, image) = init_test_environment("rw.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();
        let handle = vfs.open_file("/data.bin", true)?;
        let mut file = vfs.file(handle)?;
        assert_eq!(file.write(&data)?, data.len());
        assert_eq!(file.seek(0, SeekMode::Current), data.len() as u64);

        assert_eq!(file.seek(0, SeekMode::Begin), 0);
        let mut buf = vec![0u8; data.len() + 10];
        assert_eq!(file.read(&mut buf)?, data.len());
        assert_eq!(&buf[..data.len()], data.as_slice());
        assert_eq!(file.read(&mut buf)?, 0);

        assert_eq!(file.seek(0, SeekMode::End), data.len() as u64);
        assert_eq!(file.write(b"tail")?, 4);
        assert_eq!(vfs.get_info("data.bin")?.size, data.len() as u64 + 4);
        vfs.close_file(handle)?;

        let mut expected = data.clone();
        expected.extend_from_slice(b"tail");
        assert_eq!(read_file(&mut vfs, "data.bin")?, expected);
        Ok(())
    }

    #[test]
    fn test_rename() -> Result<()> {
        let (_dir, image) = init_test_environment("rename.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        vfs.create_dir("a")?;
        write_file(&mut vfs, "a/x", b"payload")?;

        assert!(matches!(vfs.rename("a/x", "a/x"), Err(VfsError::AlreadyExists(_))));
        assert!(matches!(vfs.rename("a/y", "b"), Err(VfsError::NotFound(_))));
        assert!(matches!(vfs.rename("a/x", "nope/x"), Err(VfsError::NotFound(_))));

        vfs.rename("a/x", "new_name")?;
        assert!(vfs.list("a")?.is_empty());
        assert_eq!(vfs.list("/")?, ["a", "new_name"]);
        assert_eq!(read_file(&mut vfs, "new_name")?, b"payload");

        // rename inside one directory
        vfs.rename("new_name", "renamed")?;
        assert_eq!(vfs.list("/")?, ["a", "renamed"]);
        Ok(())
    }

    #[test]
    fn test_rename_guards_the_tree() -> Result<()> {
        let (_dir, image) = init_test_environment("cycle.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        vfs.create_dir("a")?;
        vfs.create_dir("a/b")?;
        assert!(matches!(vfs.rename("a", "a/b/a"), Err(VfsError::InvalidPath(_))));
        assert!(matches!(vfs.rename("a", "a/c"), Err(VfsError::InvalidPath(_))));
        assert!(matches!(vfs.rename("/", "x"), Err(VfsError::InvalidPath(_))));

        vfs.rename("a/b", "b")?;
        vfs.rename("a", "b/a")?;
        assert_eq!(vfs.list("/")?, ["b"]);
        assert_eq!(vfs.list("b")?, ["a"]);
        Ok(())
    }

    #[test]
    fn test_remove() -> Result<()> {
        let (_dir, image) = init_test_environment("remove.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        vfs.create_dir("d")?;
        write_file(&mut vfs, "d/f", &[1u8; 100])?;

        assert!(matches!(vfs.remove("d"), Err(VfsError::NotEmpty(_))));
        assert!(matches!(vfs.remove("/"), Err(VfsError::InvalidPath(_))));
        assert!(matches!(vfs.remove("d/g"), Err(VfsError::NotFound(_))));

        let stats = vfs.stats()?;
        vfs.remove("d/f")?;
        vfs.remove("d")?;
        assert!(vfs.list("/")?.is_empty());
        let after = vfs.stats()?;
        assert_eq!(after.free_inodes, stats.free_inodes + 2);
        // the data block of `f` and the entry block of `d`
        assert_eq!(after.free_blocks, stats.free_blocks + 2);
        Ok(())
    }

    #[test]
    fn test_removed_inode_is_reused() -> Result<()> {
        let (_dir, image) = init_test_environment("reuse.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        vfs.create_dir("first")?;
        let id = vfs.resolve("first")?.target.unwrap();
        vfs.remove("first")?;
        write_file(&mut vfs, "second", b"2")?;
        assert_eq!(vfs.resolve("second")?.target, Some(id));
        Ok(())
    }

    #[test]
    fn test_remove_open_file_is_busy() -> Result<()> {
        let (_dir, image) = init_test_environment("busy.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        let handle = vfs.open_file("open", true)?;
        assert!(matches!(vfs.remove("open"), Err(VfsError::Busy(_))));
        vfs.close_file(handle)?;
        vfs.remove("open")?;
        Ok(())
    }

    #[test]
    fn test_remove_returns_every_block() -> Result<()> {
        let (_dir, image) = init_test_environment("bigfile.img");
        let mut vfs = Vfs::format(&image, 64 * MIB)?;
        let free = vfs.stats()?.free_blocks;

        let handle = vfs.open_file("big", true)?;
        let mut file = vfs.file(handle)?;
        file.write(&vec![3u8; 30 * BLOCK_SIZE as usize])?;
        // a sparse block 21MiB in needs double indirect pointers
        file.seek(21 * MIB as i64, SeekMode::Begin);
        file.write(b"far away")?;
        vfs.close_file(handle)?;
        assert!(vfs.stats()?.free_blocks < free - 31);

        vfs.remove("big")?;
        // the root directory keeps the block of its entries
        assert_eq!(vfs.stats()?.free_blocks, free - 1);
        Ok(())
    }

    #[test]
    fn test_exhaustion_writes_partially() -> Result<()> {
        let (_dir, image) = init_test_environment("small.img");
        let mut vfs = Vfs::format(&image, MIB)?;
        let data: Vec<u8> = (0..2 * MIB).map(|i| (i % 253) as u8).collect();

        let written = write_file(&mut vfs, "big", &data)?;
        assert!(written > 0 && written < data.len());
        assert_eq!(written as u64 % BLOCK_SIZE, 0);
        assert_eq!(vfs.stats()?.free_blocks, 0);
        assert_eq!(vfs.get_info("big")?.size, written as u64);
        assert_eq!(read_file(&mut vfs, "big")?, &data[..written]);

        // the root directory block still has room for an entry,
        // an empty directory has no block to hold one
        vfs.create_dir("more")?;
        let free_inodes = vfs.stats()?.free_inodes;
        assert!(matches!(vfs.open_file("more/f", true), Err(VfsError::NoSpace)));
        assert_eq!(vfs.stats()?.free_inodes, free_inodes);
        Ok(())
    }

    #[test]
    fn test_write_past_largest_file_changes_nothing() -> Result<()> {
        let (_dir, image) = init_test_environment("toofar.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        let handle = vfs.open_file("f", true)?;
        let free_before = vfs.stats()?.free_blocks;

        let mut file = vfs.file(handle)?;
        file.seek(21 * 1024 * MIB as i64, SeekMode::Begin);
        assert_eq!(file.write(b"x")?, 0);
        assert!(file.is_empty());
        vfs.close_file(handle)?;

        assert_eq!(vfs.stats()?.free_blocks, free_before);
        assert_eq!(vfs.get_info("f")?.size, 0);
        Ok(())
    }

    #[test]
    fn test_info_follows_the_largest_open_handle() -> Result<()> {
        let (_dir, image) = init_test_environment("twohandles.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        let first = vfs.open_file("f", true)?;
        let second = vfs.open_file("f", false)?;
        vfs.file(second)?.write(b"abcdefgh")?;
        // the older handle still caches the empty file
        assert_eq!(vfs.file(first)?.len(), 0);
        assert_eq!(vfs.get_info("f")?.size, 8);
        vfs.close_file(first)?;
        vfs.close_file(second)?;
        assert_eq!(vfs.get_info("f")?.size, 8);
        Ok(())
    }

    #[test]
    fn test_io_traits_through_handles() -> Result<()> {
        let (_dir, image) = init_test_environment("io.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        let handle = vfs.open_file("log.txt", true)?;
        {
            let mut file = vfs.file(handle)?;
            writeln!(file, "line one")?;
            writeln!(file, "line two")?;
            Seek::seek(&mut file, SeekFrom::Start(5))?;
            file.write_all(b"ONE")?;
        }
        vfs.close_file(handle)?;
        assert_eq!(read_file(&mut vfs, "log.txt")?, b"line ONE\nline two\n");
        Ok(())
    }

    #[test]
    fn test_drop_flushes_open_files() -> Result<()> {
        let (_dir, image) = init_test_environment("drop.img");
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        let handle = vfs.open_file("unclosed", true)?;
        vfs.file(handle)?.write(&[9u8; 5000])?;
        drop(vfs);

        let mut vfs = Vfs::open(&image)?;
        assert_eq!(vfs.get_info("unclosed")?.size, 5000);
        assert_eq!(read_file(&mut vfs, "unclosed")?, [9u8; 5000]);
        Ok(())
    }

    #[test]
    fn test_open_rejects_corrupted_images() -> Result<()> {
        let (_dir, image) = init_test_environment("corrupt.img");
        drop(Vfs::format(&image, MIB)?);
        let pristine = std::fs::read(&image)?;

        let mut bad_magic = pristine.clone();
        bad_magic[..4].copy_from_slice(b"ext2");
        std::fs::write(&image, &bad_magic)?;
        assert!(matches!(Vfs::open(&image), Err(VfsError::BadImage(_))));

        // one flipped bit inside the superblock breaks its digest
        let mut bad_digest = pristine.clone();
        bad_digest[8] ^= 0x10;
        std::fs::write(&image, &bad_digest)?;
        assert!(matches!(Vfs::open(&image), Err(VfsError::BadImage(_))));

        std::fs::write(&image, &pristine)?;
        assert!(Vfs::open(&image).is_ok());
        Ok(())
    }

    #[test]
    fn test_random_operations_survive_reopen() -> Result<()> {
        let (_dir, image) = init_test_environment("random.img");
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut expected: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let mut vfs = Vfs::format(&image, 16 * MIB)?;
        vfs.create_dir("dir")?;

        for _ in 0..300 {
            let name = format!("dir/file{}", rng.gen_range(0..24));
            match (expected.contains_key(&name), rng.gen_range(0..3)) {
                (false, _) => {
                    let mut data = vec![0u8; rng.gen_range(0..3 * BLOCK_SIZE as usize)];
                    rng.fill(&mut data[..]);
                    assert_eq!(write_file(&mut vfs, &name, &data)?, data.len());
                    expected.insert(name, data);
                }
                (true, 0) => {
                    vfs.remove(&name)?;
                    expected.remove(&name);
                }
                (true, _) => {
                    let mut tail = vec![0u8; rng.gen_range(1..2000)];
                    rng.fill(&mut tail[..]);
                    let handle = vfs.open_file(&name, false)?;
                    let mut file = vfs.file(handle)?;
                    file.seek(0, SeekMode::End);
                    assert_eq!(file.write(&tail)?, tail.len());
                    vfs.close_file(handle)?;
                    expected.get_mut(&name).unwrap().extend(tail);
                }
            }
        }
        drop(vfs);

        let mut vfs = Vfs::open(&image)?;
        let mut names = vfs.list("dir")?;
        names.sort();
        let expected_names: Vec<String> = expected
            .keys()
            .map(|name| name.trim_start_matches("dir/").to_string())
            .collect();
        assert_eq!(names, expected_names);
        for (name, data) in &expected {
            assert_eq!(vfs.get_info(name)?.size, data.len() as u64);
            assert_eq!(&read_file(&mut vfs, name)?, data);
        }
        Ok(())
    }
}

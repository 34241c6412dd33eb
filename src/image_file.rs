//! the image file every other component reads and writes through,
//! mapped into memory with [memmap2] and accessed by byte offset.
use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind},
    ops::Range,
    path::Path,
};

use memmap2::MmapMut;

/// a randomly addressable image file
#[derive(Debug)]
pub struct ImageFile {
    mmap: MmapMut,
}

impl ImageFile {
    /// create (or truncate) the image file and size it to `len` bytes,
    /// every byte of the new image reads as zero
    pub fn create<P>(image_path: P, len: u64) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(image_path)?;
        // all regions are set to zero using `set_len` method
        file.set_len(len)?;
        Self::map(&file)
    }

    /// open an existing image file for read and write
    pub fn open<P>(image_path: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new().read(true).write(true).open(image_path)?;
        if file.metadata()?.len() == 0 {
            return Err(io::Error::new(ErrorKind::InvalidData, "image file is empty"));
        }
        Self::map(&file)
    }

    fn map(file: &File) -> io::Result<Self> {
        // Safety
        // the image is exclusively owned by one session,
        // nothing else resizes or writes the file while it is mapped
        let mmap = unsafe { MmapMut::map_mut(file)? };
        Ok(Self { mmap })
    }

    /// size of the image in bytes
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    fn range(&self, offset: u64, len: usize) -> io::Result<Range<usize>> {
        let end = offset
            .checked_add(len as u64)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| {
                io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!(
                        "{len} bytes at offset {offset} exceed the image of {} bytes",
                        self.len()
                    ),
                )
            })?;
        Ok(offset as usize..end as usize)
    }

    /// fill `buf` with the bytes starting at `offset`
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    /// write all of `data` starting at `offset`
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let range = self.range(offset, data.len())?;
        self.mmap[range].copy_from_slice(data);
        Ok(())
    }

    /// set `len` bytes starting at `offset` to `byte`
    pub fn fill(&mut self, offset: u64, len: usize, byte: u8) -> io::Result<()> {
        let range = self.range(offset, len)?;
        self.mmap[range].fill(byte);
        Ok(())
    }

    /// borrow a region of the image in place
    pub fn region_mut(&mut self, offset: u64, len: usize) -> io::Result<&mut [u8]> {
        let range = self.range(offset, len)?;
        Ok(&mut self.mmap[range])
    }

    pub fn region(&self, offset: u64, len: usize) -> io::Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.mmap[range])
    }

    /// write dirty pages back to the image file
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }
}

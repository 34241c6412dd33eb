use std::io::{self, SeekFrom};

use log::warn;

use super::{Inode, Result, Volume, BLOCK_SIZE};

/// where a seek starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// the start of the file
    Begin,
    /// the current cursor
    Current,
    /// the end of the file
    End,
}

/// An inode opened for byte level access.
///
/// The inode record is cached here and only written back by [InodeFile::flush].
#[derive(Debug)]
pub(crate) struct InodeFile {
    pub id: u32,
    pub inode: Inode,
    pub cursor: u64,
}

impl InodeFile {
    pub fn open(volume: &Volume, id: u32) -> Result<Self> {
        Ok(Self {
            id,
            inode: volume.read_inode(id)?,
            cursor: 0,
        })
    }

    pub fn len(&self) -> u64 {
        self.inode.byte_len()
    }

    /// read from `offset` into `buf`, stopping at the end of the file
    /// # Return
    /// the number of bytes read, 0 at or past the end of the file
    pub fn read_at(&self, volume: &Volume, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.len();
        if offset >= len {
            return Ok(0);
        }
        let total = (len - offset).min(buf.len() as u64) as usize;
        let mut done = 0;
        while done < total {
            let position = offset + done as u64;
            let in_block = (position % BLOCK_SIZE) as usize;
            let chunk = (BLOCK_SIZE as usize - in_block).min(total - done);
            let dst = &mut buf[done..done + chunk];
            match volume.lookup_block(&self.inode, position / BLOCK_SIZE)? {
                Some(block) => volume.read_block_at(block, in_block, dst)?,
                // a hole left by seeking past the end
                None => dst.fill(0),
            }
            done += chunk;
        }
        Ok(done)
    }

    /// write `data` at `offset`, reserving blocks on demand
    /// # Return
    /// the number of bytes written, short if the image ran out of space
    pub fn write_at(&mut self, volume: &mut Volume, offset: u64, data: &[u8]) -> Result<usize> {
        let mut done = 0;
        while done < data.len() {
            let position = offset + done as u64;
            let in_block = (position % BLOCK_SIZE) as usize;
            let chunk = (BLOCK_SIZE as usize - in_block).min(data.len() - done);
            let Some(block) = volume.map_block(&mut self.inode, position / BLOCK_SIZE)? else {
                warn!(
                    "inode {}: out of space after {done} of {} bytes",
                    self.id,
                    data.len()
                );
                break;
            };
            volume.write_block_at(block, in_block, &data[done..done + chunk])?;
            done += chunk;
            self.inode.adjust_size(offset + done as u64);
        }
        Ok(done)
    }

    pub fn read(&mut self, volume: &Volume, buf: &mut [u8]) -> Result<usize> {
        let read = self.read_at(volume, self.cursor, buf)?;
        self.cursor += read as u64;
        Ok(read)
    }

    pub fn write(&mut self, volume: &mut Volume, data: &[u8]) -> Result<usize> {
        let written = self.write_at(volume, self.cursor, data)?;
        self.cursor += written as u64;
        Ok(written)
    }

    /// move the cursor, possibly past the end of the file,
    /// a cursor that would go below 0 stops at 0
    pub fn seek(&mut self, offset: i64, mode: SeekMode) -> u64 {
        let base = match mode {
            SeekMode::Begin => 0,
            SeekMode::Current => self.cursor,
            SeekMode::End => self.len(),
        };
        self.cursor = base.saturating_add_signed(offset);
        self.cursor
    }

    /// write the cached inode back to the inode table
    pub fn flush(&self, volume: &mut Volume) -> Result<()> {
        volume.write_inode(self.id, &self.inode)
    }
}

/// An open file, borrowed from a [Vfs](super::Vfs) session
/// through [Vfs::file](super::Vfs::file).
pub struct FileMut<'a> {
    volume: &'a mut Volume,
    file: &'a mut InodeFile,
}

impl<'a> FileMut<'a> {
    pub(crate) fn new(volume: &'a mut Volume, file: &'a mut InodeFile) -> Self {
        Self { volume, file }
    }

    /// read at the cursor and advance it
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file.read(self.volume, buf)
    }

    /// write at the cursor and advance it,
    /// a short count means the image is full
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.file.write(self.volume, data)
    }

    pub fn seek(&mut self, offset: i64, mode: SeekMode) -> u64 {
        self.file.seek(offset, mode)
    }

    pub fn len(&self) -> u64 {
        self.file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        self.file.cursor
    }
}

impl io::Read for FileMut<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.file.read(self.volume, buf)?)
    }
}

impl io::Write for FileMut<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.file.write(self.volume, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.file.flush(self.volume)?)
    }
}

impl io::Seek for FileMut<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(offset) => {
                self.file.cursor = offset;
                return Ok(offset);
            }
            SeekFrom::Current(offset) => (self.file.cursor, offset),
            SeekFrom::End(offset) => (self.file.len(), offset),
        };
        self.file.cursor = base.checked_add_signed(offset).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before the start of the file")
        })?;
        Ok(self.file.cursor)
    }
}

use thiserror::Error;

use super::FileHandle;

type Errno = i32;

/// Everything that can go wrong in a filesystem operation.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("no space left in the image")]
    NoSpace,
    #[error("file handle {0} is not open")]
    NotOpen(FileHandle),
    #[error("bad image: {0}")]
    BadImage(String),
    #[error("invalid name: {0:?}")]
    InvalidName(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("file is open: {0}")]
    Busy(String),
    #[error("capacity of {0} bytes can't hold a filesystem")]
    InvalidCapacity(u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("encode on-disk record failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("decode on-disk record failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

pub type Result<T> = std::result::Result<T, VfsError>;

impl VfsError {
    /// the closest `errno` for this error
    pub fn errno(&self) -> Errno {
        match self {
            VfsError::NotFound(_) => libc::ENOENT,
            VfsError::AlreadyExists(_) => libc::EEXIST,
            VfsError::NotADirectory(_) => libc::ENOTDIR,
            VfsError::IsADirectory(_) => libc::EISDIR,
            VfsError::NotEmpty(_) => libc::ENOTEMPTY,
            VfsError::NoSpace => libc::ENOSPC,
            VfsError::NotOpen(_) => libc::EBADF,
            VfsError::InvalidName(_) => libc::ENAMETOOLONG,
            VfsError::InvalidPath(_) | VfsError::InvalidCapacity(_) => libc::EINVAL,
            VfsError::Busy(_) => libc::EBUSY,
            VfsError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            VfsError::BadImage(_) | VfsError::Encode(_) | VfsError::Decode(_) => libc::EIO,
        }
    }
}

impl From<VfsError> for std::io::Error {
    fn from(value: VfsError) -> Self {
        match value {
            VfsError::Io(e) => e,
            e => std::io::Error::from_raw_os_error(e.errno()),
        }
    }
}

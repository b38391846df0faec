use std::os::raw::c_int;

use thiserror::Error;

type ErrorNum = c_int;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("index {0} is out of range")]
    OutOfRange(u64),
    #[error("no free data block left")]
    NoSpace,
    #[error("no free inode left")]
    TableFull,
    #[error("block {0} is already free")]
    DoubleFree(u32),
    #[error("inode {0} does not exist")]
    NotFound(u32),
    #[error("type tag {0} cannot be given to a live inode")]
    InvalidType(u32),
    #[error("size of {0} bytes exceeds the maximum file size")]
    InvalidSize(u64),
    #[error("expected a buffer of {expected} bytes, got {actual}")]
    BlockSizeMismatch { expected: usize, actual: usize },
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("corrupt image: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn errno(&self) -> ErrorNum {
        match self {
            Error::NotFound(_) => libc::ENOENT,
            Error::NoSpace | Error::TableFull => libc::ENOSPC,
            Error::InvalidSize(_) => libc::EFBIG,
            Error::OutOfRange(_) | Error::InvalidType(_) | Error::InvalidGeometry(_) | Error::BlockSizeMismatch { .. } => libc::EINVAL,
            Error::DoubleFree(_) | Error::Corrupt(_) => libc::EIO,
            Error::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn errno_mapping() {
        assert_eq!(Error::NotFound(3).errno(), libc::ENOENT);
        assert_eq!(Error::NoSpace.errno(), libc::ENOSPC);
        assert_eq!(Error::TableFull.errno(), libc::ENOSPC);
        assert_eq!(Error::InvalidSize(1 << 20).errno(), libc::EFBIG);
        assert_eq!(Error::OutOfRange(42).errno(), libc::EINVAL);
        assert_eq!(Error::InvalidType(0).errno(), libc::EINVAL);
        assert_eq!(Error::DoubleFree(7).errno(), libc::EIO);
    }
}

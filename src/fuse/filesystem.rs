use std::sync::{MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use fuser::{FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyStatfs, ReplyWrite, Request, TimeOrNow};
use log::debug;

use crate::driver::DeviceDriver;
use crate::ops::meta::{Attributes, InodeType};
use crate::ops::{ExtentStore, SharedStore};
use crate::structure::inode::InodeNumber;
use crate::util::error::{Error, Result};

const TTL: Duration = Duration::from_secs(1);
const NAME_LENGTH: u32 = 255;

/// Serves inode-addressed reads and writes to FUSE clients. Directory
/// entries are not interpreted here, so only the root is reachable by path.
pub struct FuseDriver<D: DeviceDriver> {
    store: SharedStore<D>,
}

impl<D: DeviceDriver> FuseDriver<D> {
    pub fn new(store: SharedStore<D>) -> FuseDriver<D> {
        FuseDriver { store }
    }

    fn lock(&self) -> MutexGuard<'_, ExtentStore<D>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn file_attr(&self, req: &Request<'_>, ino: u64) -> Result<FileAttr> {
        let store = self.lock();
        let attributes = store.getattr(inode_number(ino))?;
        Ok(file_attr(ino, &attributes, req.uid(), req.gid(), store.geometry().block_size))
    }

    fn read_range(&self, ino: u64, offset: i64, size: u32) -> Result<Vec<u8>> {
        let offset = usize::try_from(offset).map_err(|_| Error::OutOfRange(0))?;
        let data = self.lock().read(inode_number(ino))?;
        let start = offset.min(data.len());
        let end = start.saturating_add(size as usize).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn write_range(&self, ino: u64, offset: i64, data: &[u8]) -> Result<u32> {
        let offset = usize::try_from(offset).map_err(|_| Error::OutOfRange(0))?;
        let mut store = self.lock();
        let end = offset as u64 + data.len() as u64;
        if end > store.max_file_size() {
            return Err(Error::InvalidSize(end));
        }
        let number = inode_number(ino);
        let existing = store.read(number)?;
        store.write(number, &splice(existing, offset, data))?;
        Ok(data.len() as u32)
    }

    fn truncate(&self, ino: u64, size: u64) -> Result<()> {
        let mut store = self.lock();
        if size > store.max_file_size() {
            return Err(Error::InvalidSize(size));
        }
        let number = inode_number(ino);
        let mut data = store.read(number)?;
        data.resize(size as usize, 0);
        store.write(number, &data)
    }
}

impl<D: DeviceDriver> Filesystem for FuseDriver<D> {
    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.file_attr(req, ino) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let result = match size {
            Some(size) => {
                debug!("truncating inode {} to {} bytes", ino, size);
                self.truncate(ino, size)
            }
            None => Ok(()),
        };
        match result.and_then(|_| self.file_attr(req, ino)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.read_range(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.write_range(ino, offset, data) {
            Ok(written) => reply.written(written),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let stats = self.lock().statistics();
        reply.statfs(
            stats.data_blocks as u64,
            stats.free_blocks as u64,
            stats.free_blocks as u64,
            stats.inodes as u64,
            stats.free_inodes as u64,
            stats.block_size as u32,
            NAME_LENGTH,
            stats.block_size as u32,
        );
    }
}

fn inode_number(ino: u64) -> InodeNumber {
    // zero is never a valid inode, so oversized numbers fall through to NotFound
    InodeNumber::new(u32::try_from(ino).unwrap_or(0))
}

/// Overlays `data` at `offset`, zero-filling any gap past the current end.
fn splice(mut existing: Vec<u8>, offset: usize, data: &[u8]) -> Vec<u8> {
    let end = offset + data.len();
    if existing.len() < end {
        existing.resize(end, 0);
    }
    existing[offset..end].copy_from_slice(data);
    existing
}

fn file_attr(ino: u64, attributes: &Attributes, uid: u32, gid: u32, block_size: usize) -> FileAttr {
    let (kind, perm, nlink) = match attributes.kind {
        InodeType::Directory => (FileType::Directory, 0o755, 2),
        InodeType::File => (FileType::RegularFile, 0o644, 1),
        InodeType::Symlink => (FileType::Symlink, 0o777, 1),
        InodeType::Other(_) => (FileType::RegularFile, 0o644, 1),
    };
    FileAttr {
        ino,
        size: attributes.size,
        blocks: attributes.size.div_ceil(512),
        atime: attributes.accessed_at,
        mtime: attributes.modified_at,
        ctime: attributes.modified_at,
        crtime: attributes.created_at,
        kind,
        perm,
        nlink,
        uid,
        gid,
        rdev: 0,
        flags: 0,
        blksize: block_size as u32,
    }
}

use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::config::Geometry;
use crate::driver::memory_drive::MemoryDrive;
use crate::driver::DeviceDriver;
use crate::ops::meta::{Attributes, InodeType};
use crate::structure::inode::{Inode, InodeNumber};
use crate::structure::Structure;
use crate::util::error::{Error, Result};
use crate::util::format::pretty_size_from_bytes;

pub mod file;
pub mod meta;

/// One lock guarding the allocator and the inode table for concurrent callers.
pub type SharedStore<D> = Arc<Mutex<ExtentStore<D>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub block_size: usize,
    pub data_blocks: u32,
    pub free_blocks: u32,
    pub inodes: u32,
    pub free_inodes: u32,
}

/// Inode-addressed file store: the surface consumed by the protocol layer.
pub struct ExtentStore<D: DeviceDriver> {
    structure: Structure<D>,
}

impl ExtentStore<MemoryDrive> {
    pub fn in_memory(geometry: Geometry) -> Result<ExtentStore<MemoryDrive>> {
        let drive = MemoryDrive::new(geometry.total_bytes(), geometry.block_size);
        ExtentStore::new(drive, geometry)
    }
}

impl<D: DeviceDriver> ExtentStore<D> {
    /// Formats the device and creates the root directory as inode 1.
    pub fn new(device: D, geometry: Geometry) -> Result<ExtentStore<D>> {
        let mut structure = Structure::new(device, geometry)?;
        let root = structure.create_inode(InodeType::Directory.tag())?;
        if root != InodeNumber::ROOT {
            return Err(Error::Corrupt(format!("first inode is {}, expected {}", root, InodeNumber::ROOT)));
        }
        let store = ExtentStore { structure };
        store.log_stats();
        Ok(store)
    }

    /// Opens a formatted device.
    pub fn open(device: D) -> Result<ExtentStore<D>> {
        let structure = Structure::mount(device)?;
        if structure.live_inode(InodeNumber::ROOT).is_err() {
            return Err(Error::Corrupt("root directory is missing".to_string()));
        }
        let store = ExtentStore { structure };
        store.log_stats();
        Ok(store)
    }

    /// Opens the device if it carries a store, formats it otherwise.
    pub fn open_or_format(device: D, geometry: Geometry) -> Result<ExtentStore<D>> {
        if Structure::is_initialized(&device) {
            ExtentStore::open(device)
        } else {
            ExtentStore::new(device, geometry)
        }
    }

    pub fn shared(self) -> SharedStore<D> {
        Arc::new(Mutex::new(self))
    }

    pub fn create(&mut self, kind: InodeType) -> Result<InodeNumber> {
        let number = self.structure.create_inode(kind.tag())?;
        debug!("created {:?} {}", kind, number);
        Ok(number)
    }

    pub fn read(&mut self, number: InodeNumber) -> Result<Vec<u8>> {
        file::read_file(&mut self.structure, number)
    }

    pub fn write(&mut self, number: InodeNumber, data: &[u8]) -> Result<()> {
        file::write_file(&mut self.structure, number, data)
    }

    pub fn getattr(&self, number: InodeNumber) -> Result<Attributes> {
        file::getattr(&self.structure, number)
    }

    pub fn remove(&mut self, number: InodeNumber) -> Result<()> {
        debug!("removing inode {}", number);
        file::remove_file(&mut self.structure, number)
    }

    pub fn geometry(&self) -> Geometry {
        self.structure.geometry()
    }

    pub fn max_file_size(&self) -> u64 {
        Inode::max_file_size(self.structure.get_block_size())
    }

    pub fn statistics(&self) -> StoreStats {
        StoreStats {
            block_size: self.structure.get_block_size(),
            data_blocks: self.structure.block_map.data_blocks(),
            free_blocks: self.structure.block_map.free_count(),
            inodes: self.structure.inode_table.inode_count - 1,
            free_inodes: self.structure.inode_table.free_count(),
        }
    }

    pub fn into_device(self) -> D {
        self.structure.io.device
    }

    fn log_stats(&self) {
        let stats = self.statistics();
        info!(
            "store ready: {} free of {}, {} of {} inodes free, max file size {}",
            pretty_size_from_bytes(stats.free_blocks as u64 * stats.block_size as u64),
            pretty_size_from_bytes(stats.data_blocks as u64 * stats.block_size as u64),
            stats.free_inodes,
            stats.inodes,
            pretty_size_from_bytes(self.max_file_size())
        );
    }
}

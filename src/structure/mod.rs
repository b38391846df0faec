use log::debug;

use crate::config::Geometry;
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::structure::blockmap::BlockMap;
use crate::structure::inode::{Inode, InodeNumber};
use crate::structure::inode_table::InodeTable;
use crate::structure::layout::Layout;
use crate::structure::superblock::SuperBlock;
use crate::util::error::{Error, Result};
use crate::util::format::pretty_size_from_bytes;

pub mod blockmap;
pub mod inode;
pub mod inode_table;
pub mod layout;
pub mod superblock;

/// Block I/O plus the superblock, free-space map and inode table living on it.
pub struct Structure<A: DeviceDriver> {
    pub(crate) io: IO<A>,
    pub(crate) superblock: SuperBlock,
    pub(crate) block_map: BlockMap,
    pub(crate) inode_table: InodeTable,
}

impl<A: DeviceDriver> Structure<A> {
    /// Formats the device with the given geometry.
    pub fn new(device: A, geometry: Geometry) -> Result<Structure<A>> {
        geometry.validate(device.get_sector_size())?;
        let mut io = IO::new(device, geometry.block_size, geometry.block_count)?;
        let layout = Layout::new(&geometry);
        debug!(
            "formatting {} ({} blocks of {} bytes, {} inodes), layout {:?}",
            pretty_size_from_bytes(geometry.total_bytes()),
            geometry.block_count,
            geometry.block_size,
            geometry.inode_count,
            layout
        );

        let superblock = SuperBlock::new(&geometry);
        superblock.write(&mut io)?;
        let block_map = BlockMap::create(&mut io, &layout)?;
        let inode_table = InodeTable::create(&mut io, &layout, geometry.inode_count)?;
        io.zero_block(layout.data_start - 1)?;

        Ok(Structure { io, superblock, block_map, inode_table })
    }

    pub fn mount(device: A) -> Result<Structure<A>> {
        let superblock = SuperBlock::detect(&device)?;
        let geometry = superblock.geometry();
        geometry.validate(device.get_sector_size())?;

        let io = IO::new(device, geometry.block_size, geometry.block_count)?;
        let layout = Layout::new(&geometry);
        let block_map = BlockMap::read(&io, &layout)?;
        let inode_table = InodeTable::read(&io, &layout, geometry.inode_count)?;
        debug!("mounted {:?}", superblock);

        Ok(Structure { io, superblock, block_map, inode_table })
    }

    pub fn is_initialized(device: &A) -> bool {
        SuperBlock::detect(device).is_ok()
    }

    pub fn get_block_size(&self) -> usize {
        self.io.block_size
    }

    pub fn geometry(&self) -> Geometry {
        self.superblock.geometry()
    }

    pub fn create_inode(&mut self, kind: u32) -> Result<InodeNumber> {
        self.inode_table.allocate(&mut self.io, kind)
    }

    pub fn read_inode(&self, number: InodeNumber) -> Result<Inode> {
        self.inode_table.read_inode(&self.io, number)
    }

    pub fn write_inode(&mut self, number: InodeNumber, inode: &Inode) -> Result<()> {
        self.inode_table.write_inode(&mut self.io, number, inode)
    }

    pub fn free_inode(&mut self, number: InodeNumber) -> Result<()> {
        self.inode_table.free(&mut self.io, &mut self.block_map, number)
    }

    /// Loads a live inode; free slots and out-of-range numbers are reported as missing.
    pub fn live_inode(&self, number: InodeNumber) -> Result<Inode> {
        match self.read_inode(number) {
            Ok(inode) if !inode.is_free() => Ok(inode),
            Ok(_) | Err(Error::OutOfRange(_)) => Err(Error::NotFound(number.get())),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Structure;
    use crate::config::Geometry;
    use crate::driver::file_drive::tests::image_path;
    use crate::driver::file_drive::FileDrive;
    use crate::driver::memory_drive::MemoryDrive;
    use crate::driver::DeviceDriver;
    use crate::structure::inode::InodeNumber;
    use crate::util::error::Error;

    #[test]
    fn init() {
        let geometry = Geometry::new(512, 1024, 16);
        let structure = Structure::new(MemoryDrive::new(geometry.total_bytes(), 512), geometry).unwrap();
        assert_eq!(structure.geometry(), geometry);
        assert_eq!(structure.block_map.data_start, 19);
        assert_eq!(structure.block_map.free_count(), 1024 - 19);
        assert_eq!(structure.inode_table.free_count(), 15);
        assert!(Structure::is_initialized(&structure.io.device));
    }

    #[test]
    fn blank_device_is_not_initialized() {
        let drive = MemoryDrive::new(1024 * 512, 512);
        assert!(!Structure::is_initialized(&drive));
        assert!(matches!(Structure::mount(drive), Err(Error::Corrupt(_))));
    }

    #[test]
    fn rejects_small_device() {
        let drive = MemoryDrive::new(512 * 512, 512);
        assert!(matches!(Structure::new(drive, Geometry::new(512, 1024, 16)), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn live_inode() {
        let geometry = Geometry::new(512, 1024, 16);
        let mut structure = Structure::new(MemoryDrive::new(geometry.total_bytes(), 512), geometry).unwrap();
        let number = structure.create_inode(2).unwrap();
        assert!(structure.live_inode(number).is_ok());
        assert!(matches!(structure.live_inode(InodeNumber::new(5)), Err(Error::NotFound(5))));
        assert!(matches!(structure.live_inode(InodeNumber::new(0)), Err(Error::NotFound(0))));
        assert!(matches!(structure.live_inode(InodeNumber::new(99)), Err(Error::NotFound(99))));
    }

    #[test]
    fn mount_file_image() {
        let path = image_path("structure_mount");
        let geometry = Geometry::new(1024, 2048, 32);
        {
            let drive = FileDrive::new(&path, geometry.total_bytes(), 512).unwrap();
            let mut structure = Structure::new(drive, geometry).unwrap();
            structure.create_inode(1).unwrap();
            let number = structure.create_inode(2).unwrap();
            let block = structure.block_map.allocate(&mut structure.io).unwrap();
            let mut inode = structure.read_inode(number).unwrap();
            inode.pointers[0] = block;
            inode.size = 10;
            structure.write_inode(number, &inode).unwrap();
        }
        {
            let drive = FileDrive::open(&path, 512).unwrap();
            assert_eq!(drive.get_sector_count(), 4096);
            let structure = Structure::mount(drive).unwrap();
            assert_eq!(structure.geometry(), geometry);
            assert_eq!(structure.inode_table.free_count(), 29);
            assert_eq!(structure.block_map.free_count(), structure.block_map.data_blocks() - 1);
            assert_eq!(structure.read_inode(InodeNumber::new(2)).unwrap().size, 10);
        }
        std::fs::remove_file(&path).unwrap();
    }
}

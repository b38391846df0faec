use log::debug;

use crate::config::Geometry;
use crate::consts::SUPERBLOCK_INDEX;
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_u32, read_u64, ByteSerializable, KnownSize};

const MAGIC: u32 = 0x6578_7466;

#[derive(Debug, PartialEq)]
pub struct SuperBlock {
    pub magic: u32,
    pub size: u64,
    pub block_size: usize,
    pub block_count: u32,
    pub inode_count: u32,
}

impl SuperBlock {
    pub fn new(geometry: &Geometry) -> SuperBlock {
        SuperBlock {
            magic: MAGIC,
            size: geometry.total_bytes(),
            block_size: geometry.block_size,
            block_count: geometry.block_count,
            inode_count: geometry.inode_count,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.block_size, self.block_count, self.inode_count)
    }

    /// Reads the superblock straight from the first device sector, before the block size is known.
    pub fn detect<A: DeviceDriver>(device: &A) -> Result<SuperBlock> {
        if device.get_sector_size() < Self::size_on_disk() {
            return Err(Error::Corrupt("sector too small for a superblock".to_string()));
        }
        let sector = device.read_sector(SUPERBLOCK_INDEX as u64)?;
        let superblock = SuperBlock::from_bytes(&sector);
        superblock.check()?;
        Ok(superblock)
    }

    pub fn write<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<()> {
        let mut buffer = self.to_bytes();
        buffer.resize(io.block_size, 0);
        debug!("writing superblock {:?}", self);
        io.write_block(SUPERBLOCK_INDEX, &buffer)
    }

    fn check(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::Corrupt(format!("bad superblock magic {:#x}", self.magic)));
        }
        if self.size != self.block_size as u64 * self.block_count as u64 {
            return Err(Error::Corrupt(format!("superblock size {} does not match its geometry", self.size)));
        }
        Ok(())
    }
}

impl ByteSerializable for SuperBlock {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(Self::size_on_disk());
        buffer.extend_from_slice(&self.magic.to_le_bytes());
        buffer.extend_from_slice(&self.size.to_le_bytes());
        buffer.extend_from_slice(&(self.block_size as u32).to_le_bytes());
        buffer.extend_from_slice(&self.block_count.to_le_bytes());
        buffer.extend_from_slice(&self.inode_count.to_le_bytes());
        buffer
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        SuperBlock {
            magic: read_u32(bytes, 0),
            size: read_u64(bytes, 4),
            block_size: read_u32(bytes, 12) as usize,
            block_count: read_u32(bytes, 16),
            inode_count: read_u32(bytes, 20),
        }
    }
}

impl KnownSize for SuperBlock {
    fn size_on_disk() -> usize {
        24
    }
}

use crate::consts::{BlockPointer, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE, DEFAULT_INODE_COUNT, POINTER_SIZE};
use crate::structure::inode::Inode;
use crate::structure::layout::Layout;
use crate::structure::superblock::SuperBlock;
use crate::util::error::{Error, Result};
use crate::util::serializable::KnownSize;

/// Store geometry, fixed at format time and persisted in the superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: usize,
    pub block_count: BlockPointer,
    /// Number of inode slots, slot 0 included; valid numbers are `1..inode_count`.
    pub inode_count: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: DEFAULT_BLOCK_COUNT,
            inode_count: DEFAULT_INODE_COUNT,
        }
    }
}

impl Geometry {
    pub fn new(block_size: usize, block_count: BlockPointer, inode_count: u32) -> Geometry {
        Geometry { block_size, block_count, inode_count }
    }

    pub fn total_bytes(&self) -> u64 {
        self.block_size as u64 * self.block_count as u64
    }

    pub fn validate(&self, sector_size: usize) -> Result<()> {
        let fail = |message: String| -> Result<()> { Err(Error::InvalidGeometry(message)) };

        if self.block_size == 0 || self.block_size % sector_size != 0 {
            return fail(format!("block size {} is not a multiple of the sector size {}", self.block_size, sector_size));
        }
        if self.block_size % POINTER_SIZE != 0 {
            return fail(format!("block size {} cannot hold whole block pointers", self.block_size));
        }
        if self.block_size < Inode::size_on_disk() || self.block_size < SuperBlock::size_on_disk() {
            return fail(format!("block size {} is too small for an inode record", self.block_size));
        }
        if self.inode_count < 2 {
            return fail("at least the root inode is required".to_string());
        }

        let inodes_per_block = (self.block_size / Inode::size_on_disk()) as u64;
        if (self.inode_count as u64).div_ceil(inodes_per_block) >= self.block_count as u64 {
            return fail(format!("{} inodes do not fit in {} blocks", self.inode_count, self.block_count));
        }

        let layout = Layout::new(self);
        if layout.data_start as u64 >= self.block_count as u64 {
            return fail(format!(
                "metadata needs {} blocks, only {} available",
                layout.data_start, self.block_count
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Geometry;

    #[test]
    fn default_geometry_is_valid() {
        let geometry = Geometry::default();
        assert_eq!(geometry.total_bytes(), 16 * 1024 * 1024);
        assert!(geometry.validate(512).is_ok());
    }

    #[test]
    fn rejects_invalid_geometry() {
        assert!(Geometry::new(256, 1024, 64).validate(512).is_err());
        assert!(Geometry::new(256, 1024, 64).validate(256).is_err());
        assert!(Geometry::new(512, 1024, 1).validate(512).is_err());
        assert!(Geometry::new(512, 64, 64).validate(512).is_err());
        assert!(Geometry::new(1024, 1024, 64).validate(512).is_ok());
    }
}

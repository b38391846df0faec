use crate::config::Geometry;
use crate::consts::{BlockPointer, SUPERBLOCK_INDEX};
use crate::structure::inode::Inode;
use crate::util::serializable::KnownSize;

/// Region boundaries derived from the geometry:
/// `[superblock][bitmap][inode table][spacer][data]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub bitmap_start: BlockPointer,
    pub bitmap_blocks: u32,
    pub inode_table_start: BlockPointer,
    pub inode_table_blocks: u32,
    pub inodes_per_block: u32,
    pub data_start: BlockPointer,
}

impl Layout {
    pub fn new(geometry: &Geometry) -> Layout {
        let bits_per_block = geometry.block_size as u64 * 8;
        let bitmap_blocks = (geometry.block_count as u64).div_ceil(bits_per_block) as u32;
        let inodes_per_block = (geometry.block_size / Inode::size_on_disk()).max(1) as u32;
        let inode_table_blocks = geometry.inode_count.div_ceil(inodes_per_block);

        let bitmap_start = SUPERBLOCK_INDEX + 1;
        let inode_table_start = bitmap_start + bitmap_blocks;
        let spacer = inode_table_start + inode_table_blocks;
        Layout {
            bitmap_start,
            bitmap_blocks,
            inode_table_start,
            inode_table_blocks,
            inodes_per_block,
            data_start: spacer + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Geometry;

    #[test]
    fn default_layout() {
        let layout = super::Layout::new(&Geometry::default());
        assert_eq!(layout.bitmap_start, 1);
        assert_eq!(layout.bitmap_blocks, 8);
        assert_eq!(layout.inode_table_start, 9);
        assert_eq!(layout.inodes_per_block, 1);
        assert_eq!(layout.inode_table_blocks, 1024);
        assert_eq!(layout.data_start, 1034);
    }

    #[test]
    fn partial_bitmap_block() {
        let layout = super::Layout::new(&Geometry::new(1024, 8193, 64));
        assert_eq!(layout.bitmap_blocks, 2);
        assert_eq!(layout.inodes_per_block, 2);
        assert_eq!(layout.inode_table_start, 3);
        assert_eq!(layout.inode_table_blocks, 32);
        assert_eq!(layout.data_start, 36);
    }
}

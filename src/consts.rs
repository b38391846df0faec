use std::mem::size_of;

pub const DEFAULT_BLOCK_SIZE: usize = 512;
pub const DEFAULT_BLOCK_COUNT: u32 = 32 * 1024;
pub const DEFAULT_INODE_COUNT: u32 = 1024;
pub const DIRECT_POINTERS: usize = 100;

/// Block 0 holds the superblock, so a zero pointer never addresses data.
pub const NULL_POINTER: BlockPointer = 0;
pub const SUPERBLOCK_INDEX: BlockPointer = 0;
pub const POINTER_SIZE: usize = size_of::<BlockPointer>();

pub type BlockPointer = u32;
pub type DirectPointers = [BlockPointer; DIRECT_POINTERS];

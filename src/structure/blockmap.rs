use log::{debug, trace, warn};

use crate::consts::BlockPointer;
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::structure::layout::Layout;
use crate::util::error::{Error, Result};

/// Where the allocation bit of a block lives inside the bitmap region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitPosition {
    /// Bitmap block, relative to the start of the region.
    pub block: u32,
    /// Byte inside that bitmap block.
    pub byte: usize,
    pub bit: u8,
}

pub fn bit_position(index: BlockPointer, block_size: usize) -> BitPosition {
    let bits_per_block = block_size as u64 * 8;
    BitPosition {
        block: (index as u64 / bits_per_block) as u32,
        byte: ((index as u64 / 8) % block_size as u64) as usize,
        bit: (index % 8) as u8,
    }
}

/// Bit-per-block free-space map. The in-memory copy mirrors the bitmap
/// region; every change is written back to the bitmap block that owns it.
pub struct BlockMap {
    pub(crate) first_block: BlockPointer,
    pub(crate) data_start: BlockPointer,
    block_count: BlockPointer,
    block_size: usize,
    data: Vec<u8>,
    free_blocks: u32,
    // No free block exists in [data_start, hint).
    hint: BlockPointer,
}

impl BlockMap {
    /// Builds an empty map with every metadata block marked used and writes it out.
    pub fn create<A: DeviceDriver>(io: &mut IO<A>, layout: &Layout) -> Result<BlockMap> {
        let mut map = BlockMap {
            first_block: layout.bitmap_start,
            data_start: layout.data_start,
            block_count: io.block_count,
            block_size: io.block_size,
            data: vec![0; layout.bitmap_blocks as usize * io.block_size],
            free_blocks: io.block_count - layout.data_start,
            hint: layout.data_start,
        };
        for i in 0..layout.data_start {
            map.mark_used_mem(i);
        }
        map.write_full(io)?;
        debug!("block map: {} data blocks starting at {}", map.free_blocks, map.data_start);
        Ok(map)
    }

    /// Loads the persisted bitmap and derives the free count and scan hint from it.
    pub fn read<A: DeviceDriver>(io: &IO<A>, layout: &Layout) -> Result<BlockMap> {
        let mut data = Vec::with_capacity(layout.bitmap_blocks as usize * io.block_size);
        for i in 0..layout.bitmap_blocks {
            data.append(&mut io.read_block(layout.bitmap_start + i)?);
        }

        let mut map = BlockMap {
            first_block: layout.bitmap_start,
            data_start: layout.data_start,
            block_count: io.block_count,
            block_size: io.block_size,
            data,
            free_blocks: 0,
            hint: io.block_count,
        };

        if let Some(index) = (0..layout.data_start).find(|&i| !map.is_used(i)) {
            return Err(Error::Corrupt(format!("metadata block {} is marked free", index)));
        }
        for i in (layout.data_start..io.block_count).rev() {
            if map.is_free(i) {
                map.free_blocks += 1;
                map.hint = i;
            }
        }
        debug!("block map: {} of {} data blocks free", map.free_blocks, map.data_blocks());
        Ok(map)
    }

    pub fn write_part<A: DeviceDriver>(&self, io: &mut IO<A>, including_index: BlockPointer) -> Result<()> {
        let block = bit_position(including_index, self.block_size).block as usize;
        let data = &self.data[block * self.block_size..(block + 1) * self.block_size];
        io.write_block(self.first_block + block as BlockPointer, data)
    }

    pub fn write_full<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<()> {
        for (i, chunk) in self.data.chunks(self.block_size).enumerate() {
            io.write_block(self.first_block + i as BlockPointer, chunk)?;
        }
        Ok(())
    }

    /// First-fit scan of the data region.
    pub fn allocate<A: DeviceDriver>(&mut self, io: &mut IO<A>) -> Result<BlockPointer> {
        let mut index = self.hint.max(self.data_start);
        while index < self.block_count {
            if index % 8 == 0 && self.data[self.byte_offset(index)] == u8::MAX {
                index += 8;
                continue;
            }
            if self.is_free(index) {
                self.mark_used(io, index)?;
                self.free_blocks -= 1;
                self.hint = index + 1;
                return Ok(index);
            }
            index += 1;
        }
        self.hint = self.block_count;
        Err(Error::NoSpace)
    }

    /// Releases a data block and scrubs its contents.
    pub fn free<A: DeviceDriver>(&mut self, io: &mut IO<A>, index: BlockPointer) -> Result<()> {
        if index < self.data_start || index >= self.block_count {
            warn!("refusing to free block {} outside of the data region", index);
            return Err(Error::OutOfRange(index as u64));
        }
        if self.is_free(index) {
            warn!("block {} freed twice", index);
            return Err(Error::DoubleFree(index));
        }
        self.mark_free(io, index)?;
        io.zero_block(index)?;
        self.free_blocks += 1;
        self.hint = self.hint.min(index);
        Ok(())
    }

    pub fn free_count(&self) -> u32 {
        self.free_blocks
    }

    pub fn data_blocks(&self) -> u32 {
        self.block_count - self.data_start
    }

    pub fn is_free(&self, index: BlockPointer) -> bool {
        let position = bit_position(index, self.block_size);
        self.data[self.byte_offset(index)] & (1 << position.bit) == 0
    }

    pub fn is_used(&self, index: BlockPointer) -> bool {
        !self.is_free(index)
    }

    #[inline]
    fn byte_offset(&self, index: BlockPointer) -> usize {
        let position = bit_position(index, self.block_size);
        position.block as usize * self.block_size + position.byte
    }

    fn mark_used_mem(&mut self, index: BlockPointer) {
        let byte = self.byte_offset(index);
        let bit = bit_position(index, self.block_size).bit;
        trace!("marking used: {} {} {}", index, byte, bit);
        self.data[byte] |= 1 << bit;
    }

    fn mark_used<A: DeviceDriver>(&mut self, io: &mut IO<A>, index: BlockPointer) -> Result<()> {
        self.mark_used_mem(index);
        self.write_part(io, index)
    }

    fn mark_free_mem(&mut self, index: BlockPointer) {
        let byte = self.byte_offset(index);
        let bit = bit_position(index, self.block_size).bit;
        trace!("marking free: {} {} {}", index, byte, bit);
        self.data[byte] &= !(1 << bit);
    }

    fn mark_free<A: DeviceDriver>(&mut self, io: &mut IO<A>, index: BlockPointer) -> Result<()> {
        self.mark_free_mem(index);
        self.write_part(io, index)
    }
}

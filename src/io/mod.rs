use log::{trace, warn};

use crate::consts::{BlockPointer, POINTER_SIZE};
use crate::driver::DeviceDriver;
use crate::util::error::{Error, Result};
use crate::util::serializable::read_u32;
use raw::{raw_read_block, raw_write_block};

mod raw;

/// Fixed array of `block_count` blocks on top of a sector device.
pub struct IO<A: DeviceDriver> {
    pub(crate) device: A,
    pub block_size: usize,
    pub block_count: u32,
}

impl<A: DeviceDriver> IO<A> {
    pub fn new(device: A, block_size: usize, block_count: u32) -> Result<IO<A>> {
        let sector_size = device.get_sector_size();
        if block_size < sector_size || block_size % sector_size != 0 {
            return Err(Error::InvalidGeometry(format!(
                "block size {} is not a multiple of the sector size {}",
                block_size, sector_size
            )));
        }
        if device.get_size() < block_size as u64 * block_count as u64 {
            return Err(Error::InvalidGeometry(format!(
                "device holds {} bytes, {} blocks of {} bytes do not fit",
                device.get_size(),
                block_count,
                block_size
            )));
        }
        Ok(IO { device, block_size, block_count })
    }

    pub fn write_block(&mut self, index: BlockPointer, block: &[u8]) -> Result<()> {
        self.check_index(index)?;
        if block.len() != self.block_size {
            return Err(Error::BlockSizeMismatch { expected: self.block_size, actual: block.len() });
        }
        trace!("write block {}", index);
        raw_write_block(&mut self.device, self.block_size, block, index as u64)
    }

    pub fn read_block(&self, index: BlockPointer) -> Result<Vec<u8>> {
        self.check_index(index)?;
        trace!("read block {}", index);
        raw_read_block(&self.device, self.block_size, index as u64)
    }

    pub fn zero_block(&mut self, index: BlockPointer) -> Result<()> {
        let zeroes = vec![0; self.block_size];
        self.write_block(index, &zeroes)
    }

    /// Reads a block as an array of block pointers (an indirect block).
    pub fn read_pointers(&self, index: BlockPointer) -> Result<Vec<BlockPointer>> {
        let block = self.read_block(index)?;
        Ok((0..self.pointers_per_block()).map(|i| read_u32(&block, i * POINTER_SIZE)).collect())
    }

    /// Writes an array of block pointers as one block; missing trailing entries are zero.
    pub fn write_pointers(&mut self, index: BlockPointer, pointers: &[BlockPointer]) -> Result<()> {
        if pointers.len() > self.pointers_per_block() {
            return Err(Error::BlockSizeMismatch {
                expected: self.block_size,
                actual: pointers.len() * POINTER_SIZE,
            });
        }
        let mut block = Vec::with_capacity(self.block_size);
        for pointer in pointers {
            block.extend_from_slice(&pointer.to_le_bytes());
        }
        block.resize(self.block_size, 0);
        self.write_block(index, &block)
    }

    #[inline]
    pub fn pointers_per_block(&self) -> usize {
        self.block_size / POINTER_SIZE
    }

    fn check_index(&self, index: BlockPointer) -> Result<()> {
        if index >= self.block_count {
            warn!("block {} is outside of [0, {})", index, self.block_count);
            return Err(Error::OutOfRange(index as u64));
        }
        Ok(())
    }
}

use crate::driver::DeviceDriver;
use crate::util::error::{Error, Result};

/// Zero-initialised disk kept entirely in memory.
pub struct MemoryDrive {
    data: Vec<u8>,
    sector_size: usize,
}

impl MemoryDrive {
    pub fn new(bytes: u64, sector_size: usize) -> MemoryDrive {
        MemoryDrive { data: vec![0; bytes as usize], sector_size }
    }

    fn sector_range(&self, index: u64) -> Result<std::ops::Range<usize>> {
        if index >= self.get_sector_count() {
            return Err(Error::OutOfRange(index));
        }
        let start = index as usize * self.sector_size;
        Ok(start..start + self.sector_size)
    }
}

impl DeviceDriver for MemoryDrive {
    fn get_sector_count(&self) -> u64 {
        (self.data.len() / self.sector_size) as u64
    }

    fn get_sector_size(&self) -> usize {
        self.sector_size
    }

    fn read_sector(&self, index: u64) -> Result<Vec<u8>> {
        let range = self.sector_range(index)?;
        Ok(self.data[range].to_vec())
    }

    fn write_sector(&mut self, index: u64, data: &[u8]) -> Result<()> {
        if data.len() != self.sector_size {
            return Err(Error::BlockSizeMismatch { expected: self.sector_size, actual: data.len() });
        }
        let range = self.sector_range(index)?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}

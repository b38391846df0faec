use crate::util::error::Result;

pub mod file_drive;
pub mod memory_drive;

pub trait DeviceDriver {
    fn get_sector_count(&self) -> u64;
    fn get_sector_size(&self) -> usize;
    fn read_sector(&self, index: u64) -> Result<Vec<u8>>;
    fn write_sector(&mut self, index: u64, data: &[u8]) -> Result<()>;

    fn get_size(&self) -> u64 {
        self.get_sector_count() * self.get_sector_size() as u64
    }
}

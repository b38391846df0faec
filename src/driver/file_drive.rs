use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use log::debug;

use crate::driver::DeviceDriver;
use crate::util::error::{Error, Result};

/// Disk image stored in a regular file on the host.
pub struct FileDrive {
    file: File,
    bytes: u64,
    sector_size: usize,
}

impl FileDrive {
    pub fn new<P: AsRef<Path>>(path: P, bytes: u64, sector_size: usize) -> Result<FileDrive> {
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(path.as_ref())?;
        file.set_len(bytes)?;
        debug!("created image {} with {} bytes", path.as_ref().display(), bytes);
        Ok(FileDrive { file, bytes, sector_size })
    }

    pub fn open<P: AsRef<Path>>(path: P, sector_size: usize) -> Result<FileDrive> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let bytes = file.metadata()?.len();
        debug!("opened image {} with {} bytes", path.as_ref().display(), bytes);
        Ok(FileDrive { file, bytes, sector_size })
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if index >= self.get_sector_count() {
            return Err(Error::OutOfRange(index));
        }
        Ok(())
    }
}

impl DeviceDriver for FileDrive {
    fn get_sector_count(&self) -> u64 {
        self.bytes / self.sector_size as u64
    }

    fn get_sector_size(&self) -> usize {
        self.sector_size
    }

    fn read_sector(&self, index: u64) -> Result<Vec<u8>> {
        self.check_index(index)?;
        let mut buffer = vec![0; self.sector_size];
        self.file.read_exact_at(&mut buffer, index * self.sector_size as u64)?;
        Ok(buffer)
    }

    fn write_sector(&mut self, index: u64, sector: &[u8]) -> Result<()> {
        if sector.len() != self.sector_size {
            return Err(Error::BlockSizeMismatch { expected: self.sector_size, actual: sector.len() });
        }
        self.check_index(index)?;
        self.file.write_all_at(sector, index * self.sector_size as u64)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::driver::DeviceDriver;

    pub(crate) fn image_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("extentfs-{}-{}.img", name, std::process::id()));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn file_drive() {
        let path = image_path("file_drive");
        {
            let mut drive = super::FileDrive::new(&path, 1024 * 512, 512).unwrap();

            let sector0 = vec![0x42; 512];
            let sector1 = vec![0x1; 512];
            let sector1023 = vec![0x52; 512];

            drive.write_sector(0, &sector0).unwrap();
            drive.write_sector(1, &sector1).unwrap();
            drive.write_sector(1023, &sector1023).unwrap();

            assert_eq!(drive.read_sector(0).unwrap(), sector0);
            assert_eq!(drive.read_sector(1).unwrap(), sector1);
            assert_eq!(drive.read_sector(1023).unwrap(), sector1023);
            assert_eq!(drive.read_sector(2).unwrap(), vec![0; 512]);
            assert!(drive.read_sector(1024).is_err());
        }
        {
            let drive = super::FileDrive::open(&path, 512).unwrap();
            assert_eq!(drive.get_sector_count(), 1024);
            assert_eq!(drive.read_sector(1023).unwrap(), vec![0x52; 512]);
        }
        fs::remove_file(&path).unwrap();
    }
}

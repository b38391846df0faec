pub mod config;
pub mod consts;
pub mod driver;
pub mod fuse;
pub mod io;
pub mod ops;
pub mod structure;
pub mod util;

pub use config::Geometry;
pub use driver::file_drive::FileDrive;
pub use driver::memory_drive::MemoryDrive;
pub use driver::DeviceDriver;
pub use ops::meta::{Attributes, InodeType};
pub use ops::{ExtentStore, SharedStore, StoreStats};
pub use structure::inode::InodeNumber;
pub use util::error::{Error, Result};

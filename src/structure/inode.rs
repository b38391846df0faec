use std::fmt;
use std::time::SystemTime;

use crate::consts::{BlockPointer, DirectPointers, DIRECT_POINTERS, NULL_POINTER, POINTER_SIZE};
use crate::util::serializable::{read_u32, read_u64, ByteSerializable, KnownSize};

/// Tag of an unused inode slot.
pub const FREE_KIND: u32 = 0;

/// One-based inode handle. Zero is never issued; 1 is the root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InodeNumber(u32);

impl InodeNumber {
    pub const ROOT: InodeNumber = InodeNumber(1);

    pub const fn new(number: u32) -> InodeNumber {
        InodeNumber(number)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// True for `1 <= n < inode_count`.
    pub fn is_valid(self, inode_count: u32) -> bool {
        self.0 >= 1 && self.0 < inode_count
    }
}

impl From<u32> for InodeNumber {
    fn from(number: u32) -> Self {
        InodeNumber(number)
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-size inode record as stored in the inode table.
#[derive(Debug, Clone, PartialEq)]
pub struct Inode {
    pub(crate) kind: u32,
    pub(crate) size: u64,
    pub(crate) accessed_at: SystemTime,
    pub(crate) modified_at: SystemTime,
    pub(crate) created_at: SystemTime,
    pub(crate) pointers: DirectPointers,
    pub(crate) indirect: BlockPointer,
}

impl Inode {
    pub fn new(kind: u32, now: SystemTime) -> Inode {
        Inode {
            kind,
            size: 0,
            accessed_at: now,
            modified_at: now,
            created_at: now,
            pointers: [NULL_POINTER; DIRECT_POINTERS],
            indirect: NULL_POINTER,
        }
    }

    pub fn free() -> Inode {
        Inode::new(FREE_KIND, SystemTime::UNIX_EPOCH)
    }

    pub fn is_free(&self) -> bool {
        self.kind == FREE_KIND
    }

    /// Blocks needed to hold `size` bytes.
    pub fn blocks_for(size: u64, block_size: usize) -> usize {
        size.div_ceil(block_size as u64) as usize
    }

    pub fn block_count(&self, block_size: usize) -> usize {
        Inode::blocks_for(self.size, block_size)
    }

    /// Largest file the direct pointers plus one indirect block can address.
    pub fn max_file_size(block_size: usize) -> u64 {
        ((DIRECT_POINTERS + block_size / POINTER_SIZE) * block_size) as u64
    }

    pub fn owns_blocks(&self) -> bool {
        self.indirect != NULL_POINTER || self.pointers.iter().any(|&p| p != NULL_POINTER)
    }
}

impl ByteSerializable for Inode {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::<u8>::with_capacity(Self::size_on_disk());
        bytes.extend_from_slice(&self.kind.to_le_bytes());
        bytes.extend_from_slice(&self.size.to_le_bytes());
        bytes.extend_from_slice(&self.accessed_at.to_bytes());
        bytes.extend_from_slice(&self.modified_at.to_bytes());
        bytes.extend_from_slice(&self.created_at.to_bytes());
        for pointer in self.pointers.iter() {
            bytes.extend_from_slice(&pointer.to_le_bytes());
        }
        bytes.extend_from_slice(&self.indirect.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let time = SystemTime::size_on_disk();
        let time_start = 4 + 8;
        let pointer_start = time_start + 3 * time;

        let mut pointers = [NULL_POINTER; DIRECT_POINTERS];
        for (i, pointer) in pointers.iter_mut().enumerate() {
            *pointer = read_u32(bytes, pointer_start + i * POINTER_SIZE);
        }

        Inode {
            kind: read_u32(bytes, 0),
            size: read_u64(bytes, 4),
            accessed_at: SystemTime::from_bytes(&bytes[time_start..time_start + time]),
            modified_at: SystemTime::from_bytes(&bytes[time_start + time..time_start + 2 * time]),
            created_at: SystemTime::from_bytes(&bytes[time_start + 2 * time..pointer_start]),
            pointers,
            indirect: read_u32(bytes, pointer_start + DIRECT_POINTERS * POINTER_SIZE),
        }
    }
}

impl KnownSize for Inode {
    #[inline]
    fn size_on_disk() -> usize {
        4 + 8 + 3 * SystemTime::size_on_disk() + (DIRECT_POINTERS + 1) * POINTER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::{Inode, InodeNumber};
    use crate::util::serializable::{ByteSerializable, KnownSize};

    #[test]
    fn inode_bytes() {
        let now = SystemTime::UNIX_EPOCH + Duration::new(1_700_000_000, 5);
        let mut inode = Inode::new(2, now);
        inode.size = 101 * 512;
        for (i, pointer) in inode.pointers.iter_mut().enumerate() {
            *pointer = 1000 + i as u32;
        }
        inode.indirect = 77;
        inode.accessed_at = now + Duration::from_secs(3);

        let bytes = inode.to_bytes();
        assert_eq!(bytes.len(), Inode::size_on_disk());
        assert_eq!(Inode::size_on_disk(), 452);
        assert_eq!(Inode::from_bytes(&bytes), inode);
    }

    #[test]
    fn zeroed_record_is_free() {
        let inode = Inode::from_bytes(&[0u8; 452]);
        assert!(inode.is_free());
        assert!(!inode.owns_blocks());
        assert_eq!(inode, Inode::free());
    }

    #[test]
    fn sizes() {
        assert_eq!(Inode::max_file_size(512), (100 + 128) * 512);
        assert_eq!(Inode::blocks_for(0, 512), 0);
        assert_eq!(Inode::blocks_for(1, 512), 1);
        assert_eq!(Inode::blocks_for(512, 512), 1);
        assert_eq!(Inode::blocks_for(1500, 512), 3);
        assert_eq!(Inode::blocks_for(100 * 512 + 10, 512), 101);
    }

    #[test]
    fn inode_numbers() {
        assert!(!InodeNumber::new(0).is_valid(64));
        assert!(InodeNumber::ROOT.is_valid(64));
        assert!(InodeNumber::new(63).is_valid(64));
        assert!(!InodeNumber::new(64).is_valid(64));
        assert!(!InodeNumber::new(u32::MAX).is_valid(64));
    }
}

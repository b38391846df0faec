use std::time::SystemTime;

use crate::structure::inode::Inode;

/// Type tags understood by the protocol layer; the store keeps them as raw numbers.
/// Tags outside the known three pass through untouched as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    Directory,
    File,
    Symlink,
    Other(u32),
}

impl InodeType {
    pub fn tag(self) -> u32 {
        match self {
            InodeType::Directory => 1,
            InodeType::File => 2,
            InodeType::Symlink => 3,
            InodeType::Other(tag) => tag,
        }
    }
}

impl From<u32> for InodeType {
    fn from(tag: u32) -> Self {
        match tag {
            1 => InodeType::Directory,
            2 => InodeType::File,
            3 => InodeType::Symlink,
            _ => InodeType::Other(tag),
        }
    }
}

/// Attribute snapshot returned by `getattr`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    pub kind: InodeType,
    pub size: u64,
    pub accessed_at: SystemTime,
    pub modified_at: SystemTime,
    pub created_at: SystemTime,
}

impl From<&Inode> for Attributes {
    fn from(inode: &Inode) -> Self {
        Attributes {
            kind: InodeType::from(inode.kind),
            size: inode.size,
            accessed_at: inode.accessed_at,
            modified_at: inode.modified_at,
            created_at: inode.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::{Attributes, InodeType};
    use crate::structure::inode::Inode;

    #[test]
    fn type_tags() {
        for kind in [InodeType::Directory, InodeType::File, InodeType::Symlink, InodeType::Other(9)] {
            assert_eq!(InodeType::from(kind.tag()), kind);
        }
        assert_eq!(InodeType::from(2), InodeType::File);
        assert_eq!(InodeType::from(7), InodeType::Other(7));
        assert_eq!(InodeType::Other(7).tag(), 7);
    }

    #[test]
    fn attributes_from_inode() {
        let now = SystemTime::now();
        let mut inode = Inode::new(InodeType::Symlink.tag(), now);
        inode.size = 17;
        let attributes = Attributes::from(&inode);
        assert_eq!(attributes.kind, InodeType::Symlink);
        assert_eq!(attributes.size, 17);
        assert_eq!(attributes.created_at, now);

        let opaque = Attributes::from(&Inode::new(7, now));
        assert_eq!(opaque.kind.tag(), 7);
    }
}

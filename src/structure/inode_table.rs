use std::time::SystemTime;

use log::{debug, warn};

use crate::consts::{BlockPointer, DIRECT_POINTERS, NULL_POINTER};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::structure::blockmap::BlockMap;
use crate::structure::inode::{Inode, InodeNumber, FREE_KIND};
use crate::structure::layout::Layout;
use crate::util::error::{Error, Result};
use crate::util::serializable::{ByteSerializable, KnownSize};

/// Fixed-size inode records packed into the inode table region. The
/// occupancy map is rebuilt from the records at mount and kept in step
/// with every allocation and release.
pub struct InodeTable {
    map: Vec<u8>,
    table_index: BlockPointer,
    pub(crate) inode_count: u32,
    inodes_per_block: u32,
    used: u32,
}

impl InodeTable {
    pub fn create<A: DeviceDriver>(io: &mut IO<A>, layout: &Layout, inode_count: u32) -> Result<InodeTable> {
        for i in 0..layout.inode_table_blocks {
            io.zero_block(layout.inode_table_start + i)?;
        }
        let mut table = InodeTable::empty(layout, inode_count);
        // slot 0 is never issued
        table.mark_used_mem(0);
        Ok(table)
    }

    pub fn read<A: DeviceDriver>(io: &IO<A>, layout: &Layout, inode_count: u32) -> Result<InodeTable> {
        let mut table = InodeTable::empty(layout, inode_count);
        table.mark_used_mem(0);
        for i in 1..inode_count {
            if !table.read_inode(io, InodeNumber::new(i))?.is_free() {
                table.mark_used_mem(i);
                table.used += 1;
            }
        }
        debug!("inode table: {} of {} inodes in use", table.used, inode_count - 1);
        Ok(table)
    }

    fn empty(layout: &Layout, inode_count: u32) -> InodeTable {
        InodeTable {
            map: vec![0u8; inode_count.div_ceil(8) as usize],
            table_index: layout.inode_table_start,
            inode_count,
            inodes_per_block: layout.inodes_per_block,
            used: 0,
        }
    }

    /// Returns an independent copy of the stored record.
    pub fn read_inode<A: DeviceDriver>(&self, io: &IO<A>, number: InodeNumber) -> Result<Inode> {
        self.check(number)?;
        let block = io.read_block(self.inode_block(number))?;
        let offset = self.inode_offset(number);
        Ok(Inode::from_bytes(&block[offset..offset + Inode::size_on_disk()]))
    }

    pub fn write_inode<A: DeviceDriver>(&self, io: &mut IO<A>, number: InodeNumber, inode: &Inode) -> Result<()> {
        self.check(number)?;
        let inode_block = self.inode_block(number);
        let offset = self.inode_offset(number);

        let mut block = io.read_block(inode_block)?;
        block[offset..offset + Inode::size_on_disk()].copy_from_slice(&inode.to_bytes());
        io.write_block(inode_block, &block)
    }

    /// Hands out the lowest free slot, reinitialised as an empty inode of `kind`.
    pub fn allocate<A: DeviceDriver>(&mut self, io: &mut IO<A>, kind: u32) -> Result<InodeNumber> {
        if kind == FREE_KIND {
            warn!("refusing to allocate an inode with the free tag");
            return Err(Error::InvalidType(kind));
        }
        let number = (1..self.inode_count).find(|&i| !self.is_used(i)).ok_or(Error::TableFull)?;
        let number = InodeNumber::new(number);

        self.write_inode(io, number, &Inode::new(kind, SystemTime::now()))?;
        self.mark_used_mem(number.get());
        self.used += 1;
        debug!("allocated inode {} of kind {}", number, kind);
        Ok(number)
    }

    /// Releases every block owned by the inode and returns the slot to the pool.
    /// Freeing a free slot does nothing.
    pub fn free<A: DeviceDriver>(&mut self, io: &mut IO<A>, block_map: &mut BlockMap, number: InodeNumber) -> Result<()> {
        let mut inode = self.read_inode(io, number)?;
        if inode.is_free() {
            return Ok(());
        }

        if inode.owns_blocks() {
            release_blocks(io, block_map, &mut inode, 0)?;
        }
        self.write_inode(io, number, &Inode::free())?;
        self.mark_free_mem(number.get());
        self.used -= 1;
        debug!("freed inode {}", number);
        Ok(())
    }

    pub fn contains(&self, number: InodeNumber) -> bool {
        number.is_valid(self.inode_count)
    }

    pub fn free_count(&self) -> u32 {
        self.inode_count - 1 - self.used
    }

    fn check(&self, number: InodeNumber) -> Result<()> {
        if !self.contains(number) {
            warn!("inode {} is outside of [1, {})", number, self.inode_count);
            return Err(Error::OutOfRange(number.get() as u64));
        }
        Ok(())
    }

    #[inline]
    fn inode_block(&self, number: InodeNumber) -> BlockPointer {
        self.table_index + number.get() / self.inodes_per_block
    }

    #[inline]
    fn inode_offset(&self, number: InodeNumber) -> usize {
        (number.get() % self.inodes_per_block) as usize * Inode::size_on_disk()
    }

    fn is_used(&self, index: u32) -> bool {
        self.map[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    fn mark_used_mem(&mut self, index: u32) {
        self.map[(index / 8) as usize] |= 1 << (index % 8);
    }

    fn mark_free_mem(&mut self, index: u32) {
        self.map[(index / 8) as usize] &= !(1 << (index % 8));
    }
}

/// Releases every block of `inode` at logical index `keep` or above and
/// drops the indirect block once no indirect entry is needed. Returns the
/// indirect entries still owned; when the indirect block survives, the
/// caller writes them back.
pub(crate) fn release_blocks<A: DeviceDriver>(
    io: &mut IO<A>,
    block_map: &mut BlockMap,
    inode: &mut Inode,
    keep: usize,
) -> Result<Vec<BlockPointer>> {
    for pointer in inode.pointers.iter_mut().skip(keep) {
        if *pointer != NULL_POINTER {
            block_map.free(io, *pointer)?;
            *pointer = NULL_POINTER;
        }
    }

    if inode.indirect == NULL_POINTER {
        return Ok(vec![NULL_POINTER; io.pointers_per_block()]);
    }

    let mut entries = io.read_pointers(inode.indirect)?;
    for entry in entries.iter_mut().skip(keep.saturating_sub(DIRECT_POINTERS)) {
        if *entry != NULL_POINTER {
            block_map.free(io, *entry)?;
            *entry = NULL_POINTER;
        }
    }
    if keep <= DIRECT_POINTERS {
        block_map.free(io, inode.indirect)?;
        inode.indirect = NULL_POINTER;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::InodeTable;
    use crate::config::Geometry;
    use crate::driver::memory_drive::MemoryDrive;
    use crate::io::IO;
    use crate::structure::blockmap::BlockMap;
    use crate::structure::inode::{Inode, InodeNumber};
    use crate::structure::layout::Layout;
    use crate::util::error::Error;

    const FILE: u32 = 2;

    fn setup() -> (IO<MemoryDrive>, Layout, BlockMap, InodeTable) {
        let geometry = Geometry::new(512, 1024, 16);
        let layout = Layout::new(&geometry);
        let mut io = IO::new(MemoryDrive::new(geometry.total_bytes(), 512), 512, 1024).unwrap();
        let block_map = BlockMap::create(&mut io, &layout).unwrap();
        let table = InodeTable::create(&mut io, &layout, 16).unwrap();
        (io, layout, block_map, table)
    }

    #[test]
    fn first_inode_is_one() {
        let (mut io, _, _, mut table) = setup();
        assert_eq!(table.allocate(&mut io, 1).unwrap(), InodeNumber::ROOT);
        assert_eq!(table.allocate(&mut io, FILE).unwrap(), InodeNumber::new(2));
        assert_eq!(table.free_count(), 13);
    }

    #[test]
    fn read_write_inode() {
        let (mut io, layout, _, mut table) = setup();
        let number = table.allocate(&mut io, FILE).unwrap();
        let mut inode = table.read_inode(&io, number).unwrap();
        assert_eq!(inode.kind, FILE);
        assert_eq!(inode.size, 0);
        assert!(!inode.owns_blocks());

        inode.size = 42;
        table.write_inode(&mut io, number, &inode).unwrap();
        assert_eq!(table.read_inode(&io, number).unwrap(), inode);

        let reread = InodeTable::read(&io, &layout, 16).unwrap();
        assert_eq!(reread.read_inode(&io, number).unwrap(), inode);
        assert_eq!(reread.free_count(), table.free_count());
    }

    #[test]
    fn out_of_range() {
        let (mut io, _, _, table) = setup();
        for number in [0, 16, 1000] {
            let number = InodeNumber::new(number);
            assert!(matches!(table.read_inode(&io, number), Err(Error::OutOfRange(_))));
            assert!(matches!(table.write_inode(&mut io, number, &Inode::new(FILE, std::time::SystemTime::now())), Err(Error::OutOfRange(_))));
        }
        for i in 1..16 {
            assert!(table.read_inode(&io, InodeNumber::new(i)).unwrap().is_free());
        }
    }

    #[test]
    fn table_full_and_reuse() {
        let (mut io, _, mut block_map, mut table) = setup();
        for i in 1..16 {
            assert_eq!(table.allocate(&mut io, FILE).unwrap(), InodeNumber::new(i));
        }
        assert!(matches!(table.allocate(&mut io, FILE), Err(Error::TableFull)));

        table.free(&mut io, &mut block_map, InodeNumber::new(7)).unwrap();
        assert!(table.read_inode(&io, InodeNumber::new(7)).unwrap().is_free());
        assert_eq!(table.allocate(&mut io, FILE).unwrap(), InodeNumber::new(7));
    }

    #[test]
    fn free_is_idempotent() {
        let (mut io, _, mut block_map, mut table) = setup();
        let number = table.allocate(&mut io, FILE).unwrap();
        table.free(&mut io, &mut block_map, number).unwrap();
        table.free(&mut io, &mut block_map, number).unwrap();
        assert_eq!(table.free_count(), 15);
    }

    #[test]
    fn free_tag_is_rejected() {
        let (mut io, _, mut block_map, mut table) = setup();
        assert!(matches!(table.allocate(&mut io, 0), Err(Error::InvalidType(0))));
        assert_eq!(table.free_count(), 15);
        assert!(table.read_inode(&io, InodeNumber::new(1)).unwrap().is_free());

        // the slot stays available and a later free of it is still a no-op
        assert_eq!(table.allocate(&mut io, FILE).unwrap(), InodeNumber::new(1));
        table.free(&mut io, &mut block_map, InodeNumber::new(1)).unwrap();
        assert_eq!(table.free_count(), 15);
    }

    #[test]
    fn free_releases_blocks() {
        let (mut io, _, mut block_map, mut table) = setup();
        let before = block_map.free_count();
        let number = table.allocate(&mut io, FILE).unwrap();

        let mut inode = table.read_inode(&io, number).unwrap();
        for pointer in inode.pointers.iter_mut() {
            *pointer = block_map.allocate(&mut io).unwrap();
        }
        let indirect = block_map.allocate(&mut io).unwrap();
        let entries = [block_map.allocate(&mut io).unwrap(), block_map.allocate(&mut io).unwrap()];
        io.write_pointers(indirect, &entries).unwrap();
        inode.indirect = indirect;
        inode.size = 102 * 512;
        table.write_inode(&mut io, number, &inode).unwrap();
        assert_eq!(block_map.free_count(), before - 103);

        table.free(&mut io, &mut block_map, number).unwrap();
        assert_eq!(block_map.free_count(), before);
        assert_eq!(table.read_inode(&io, number).unwrap(), Inode::free());
        assert!(block_map.is_free(indirect) && block_map.is_free(entries[1]));
    }
}

use std::time::SystemTime;

use log::{debug, warn};

use crate::consts::{BlockPointer, DIRECT_POINTERS, NULL_POINTER};
use crate::driver::DeviceDriver;
use crate::ops::meta::Attributes;
use crate::structure::inode::{Inode, InodeNumber};
use crate::structure::inode_table::release_blocks;
use crate::structure::Structure;
use crate::util::error::{Error, Result};

/// Reads the whole content of a file and bumps its access time.
pub fn read_file<A: DeviceDriver>(structure: &mut Structure<A>, number: InodeNumber) -> Result<Vec<u8>> {
    let mut inode = structure.live_inode(number)?;
    let block_size = structure.get_block_size();
    if inode.size > Inode::max_file_size(block_size) {
        return Err(Error::Corrupt(format!("inode {} claims {} bytes", number, inode.size)));
    }
    let size = inode.size as usize;

    let mut result = Vec::with_capacity(size);
    let mut indirect: Option<Vec<BlockPointer>> = None;
    for i in 0..inode.block_count(block_size) {
        let pointer = if i < DIRECT_POINTERS {
            inode.pointers[i]
        } else {
            if indirect.is_none() {
                if inode.indirect == NULL_POINTER {
                    return Err(Error::Corrupt(format!("inode {} has no indirect block", number)));
                }
                indirect = Some(structure.io.read_pointers(inode.indirect)?);
            }
            indirect
                .as_ref()
                .and_then(|entries| entries.get(i - DIRECT_POINTERS).copied())
                .unwrap_or(NULL_POINTER)
        };
        if pointer == NULL_POINTER {
            return Err(Error::Corrupt(format!("inode {} has no block at index {}", number, i)));
        }

        let block = structure.io.read_block(pointer)?;
        let length = block_size.min(size - result.len());
        result.extend_from_slice(&block[..length]);
    }

    inode.accessed_at = SystemTime::now();
    structure.write_inode(number, &inode)?;
    Ok(result)
}

/// Replaces the content of a file. Blocks already owned at a logical index
/// are reused; blocks past the new end are released. Space is checked up
/// front so a `NoSpace` failure leaves the store untouched.
pub fn write_file<A: DeviceDriver>(structure: &mut Structure<A>, number: InodeNumber, data: &[u8]) -> Result<()> {
    let block_size = structure.get_block_size();
    if data.len() as u64 > Inode::max_file_size(block_size) {
        warn!("write of {} bytes to inode {} exceeds the maximum file size", data.len(), number);
        return Err(Error::InvalidSize(data.len() as u64));
    }
    let mut inode = structure.live_inode(number)?;

    let old_blocks = inode.block_count(block_size);
    let new_blocks = Inode::blocks_for(data.len() as u64, block_size);
    let needs_indirect = new_blocks > DIRECT_POINTERS;
    let fresh = new_blocks.saturating_sub(old_blocks) + usize::from(needs_indirect && inode.indirect == NULL_POINTER);
    if fresh > structure.block_map.free_count() as usize {
        warn!("write to inode {} needs {} blocks, {} free", number, fresh, structure.block_map.free_count());
        return Err(Error::NoSpace);
    }

    let Structure { io, block_map, .. } = &mut *structure;
    let mut entries = release_blocks(io, block_map, &mut inode, new_blocks)?;

    for (i, chunk) in data.chunks(block_size).enumerate() {
        let slot = if i < DIRECT_POINTERS {
            &mut inode.pointers[i]
        } else {
            &mut entries[i - DIRECT_POINTERS]
        };
        if *slot == NULL_POINTER {
            *slot = block_map.allocate(io)?;
        }

        let mut block = chunk.to_vec();
        block.resize(block_size, 0);
        io.write_block(*slot, &block)?;
    }

    if needs_indirect {
        if inode.indirect == NULL_POINTER {
            inode.indirect = block_map.allocate(io)?;
        }
        io.write_pointers(inode.indirect, &entries)?;
    }

    inode.size = data.len() as u64;
    inode.modified_at = SystemTime::now();
    structure.write_inode(number, &inode)?;
    debug!("inode {}: wrote {} bytes in {} blocks (was {})", number, data.len(), new_blocks, old_blocks);
    Ok(())
}

pub fn getattr<A: DeviceDriver>(structure: &Structure<A>, number: InodeNumber) -> Result<Attributes> {
    let inode = structure.live_inode(number)?;
    Ok(Attributes::from(&inode))
}

pub fn remove_file<A: DeviceDriver>(structure: &mut Structure<A>, number: InodeNumber) -> Result<()> {
    structure.free_inode(number)
}

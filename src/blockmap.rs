//! Inode block map (component C, spec §4.3): translates a logical block
//! index within a file into a physical LBA, allocating on demand.
//!
//! Grounded on `examples/original_source/inode.c`'s `xv6_inode_block` (the
//! read-only walk) and `xv6_inode_wblock` (the allocating walk), and on
//! `LENSHOOD-xv6-rust`'s `bmap`. The reference driver keeps a cached
//! `addrs` array on the in-core inode and only re-reads the dinode when
//! that cache is absent; here `DiskInode` is always loaded up front, so
//! there's no cache-miss branch to carry over.

use crate::alloc;
use crate::device::{BlockDevice, BlockHandle};
use crate::dinode::DiskInode;
use crate::error::{FsError, FsResult};
use crate::layout::{SuperBlock, MAXFILE, NDIRECT, NINDIRECT};

/// Logical-to-physical translation without allocating. Returns `None` for
/// a hole (an all-zero logical block that was never written).
pub fn read_addr<D: BlockDevice>(
    device: &D,
    inode: &DiskInode,
    index: u32,
) -> FsResult<Option<u32>> {
    let index = index as usize;
    if index >= MAXFILE {
        return Err(FsError::FileTooBig { index: index as u32 });
    }
    if index < NDIRECT {
        let b = inode.addrs[index];
        return Ok(if b == 0 { None } else { Some(b) });
    }

    let indirect_lba = inode.addrs[NDIRECT];
    if indirect_lba == 0 {
        return Ok(None);
    }
    let i = index - NDIRECT;
    let handle = device.read(indirect_lba)?;
    let b = read_indirect_entry(handle.data(), i);
    Ok(if b == 0 { None } else { Some(b) })
}

/// Logical-to-physical translation, allocating direct/indirect blocks (and
/// the indirect block itself) as needed. Mutates `inode.addrs` in place;
/// the caller is responsible for persisting the dinode afterwards.
pub fn write_addr<D: BlockDevice>(
    device: &D,
    sb: &SuperBlock,
    inode: &mut DiskInode,
    index: u32,
    hint: &mut u32,
) -> FsResult<u32> {
    let idx = index as usize;
    if idx >= MAXFILE {
        return Err(FsError::FileTooBig { index });
    }

    if idx < NDIRECT {
        if inode.addrs[idx] == 0 {
            inode.addrs[idx] = alloc::allocate(device, sb, hint)?;
        }
        return Ok(inode.addrs[idx]);
    }

    if inode.addrs[NDIRECT] == 0 {
        // `allocate` always zeroes the block it hands back (spec §4.2), so
        // the indirect block's entries already read as "unallocated"
        // without a second zeroing pass here (see DESIGN.md's Open
        // Question decisions).
        inode.addrs[NDIRECT] = alloc::allocate(device, sb, hint)?;
    }
    let indirect_lba = inode.addrs[NDIRECT];
    let i = idx - NDIRECT;

    let mut handle = device.read(indirect_lba)?;
    let existing = read_indirect_entry(handle.data(), i);
    if existing != 0 {
        return Ok(existing);
    }
    let data_lba = alloc::allocate(device, sb, hint)?;
    write_indirect_entry(handle.data_mut(), i, data_lba);
    handle.mark_dirty();
    handle.flush()?;
    Ok(data_lba)
}

/// Release every block an inode owns, direct and indirect, and clear its
/// `addrs`. Grounded on `original_source/inode.c`'s `xv6_itrunc`.
pub fn truncate<D: BlockDevice>(
    device: &D,
    sb: &SuperBlock,
    inode: &mut DiskInode,
) -> FsResult<()> {
    for slot in inode.addrs[..NDIRECT].iter_mut() {
        if *slot != 0 {
            alloc::free(device, sb, *slot)?;
            *slot = 0;
        }
    }
    if inode.addrs[NDIRECT] != 0 {
        let handle = device.read(inode.addrs[NDIRECT])?;
        for i in 0..NINDIRECT {
            let b = read_indirect_entry(handle.data(), i);
            if b != 0 {
                alloc::free(device, sb, b)?;
            }
        }
        drop(handle);
        alloc::free(device, sb, inode.addrs[NDIRECT])?;
        inode.addrs[NDIRECT] = 0;
    }
    inode.size = 0;
    Ok(())
}

fn read_indirect_entry(block: &[u8; crate::layout::BSIZE], i: usize) -> u32 {
    let o = i * 4;
    u32::from_le_bytes(block[o..o + 4].try_into().unwrap())
}

fn write_indirect_entry(block: &mut [u8; crate::layout::BSIZE], i: usize, v: u32) {
    let o = i * 4;
    block[o..o + 4].copy_from_slice(&v.to_le_bytes());
}

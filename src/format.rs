//! Disk image formatter: lays out a fresh superblock, bitmap and root
//! directory on a blank block device.
//!
//! Grounded on `LENSHOOD-xv6-rust/mkfs/src/main.rs` (`wsect`/`rsect`/
//! `ialloc`/`balloc`/`iappend`), generalized from that tool's hardcoded
//! `FSSIZE`/`NINODES` constants and raw-file sector I/O into a reusable
//! routine over any [`BlockDevice`], consumed by both the `mkfs` binary
//! and this crate's own integration tests.

use crate::alloc;
use crate::device::{BlockDevice, BlockHandle};
use crate::dinode::{Dirent, DiskInode, InodeType};
use crate::error::{FsError, FsResult};
use crate::itable;
use crate::layout::{SuperBlock, BPB, DIRENT_SIZE, FSMAGIC, ROOTINO};

/// Matches the reference mkfs's `LOGSIZE` (`MAXOPBLOCKS * 3`). The log
/// region is reserved on disk but never exercised by this engine (spec
/// §1 Non-goals: journaling).
pub const DEFAULT_NLOG: u32 = 30;

/// Format `device` as a `size`-block xv6-style image with room for
/// `ninodes` inodes, and return the superblock that was written.
pub fn format<D: BlockDevice>(device: &D, size: u32, ninodes: u32) -> FsResult<SuperBlock> {
    if device.read_only() {
        return Err(FsError::ReadOnly);
    }

    let nlog = DEFAULT_NLOG;
    let inodestart = 1 + nlog;
    let mut sb = SuperBlock {
        magic: FSMAGIC,
        size,
        nblocks: 0,
        ninodes,
        nlog,
        logstart: 1,
        inodestart,
        bmapstart: 0,
    };
    sb.bmapstart = inodestart + sb.inode_blocks();
    let data_start = sb.bmapstart + sb.bitmap_blocks();
    if data_start >= size {
        return Err(FsError::Invalid(format!(
            "image of {size} blocks is too small to hold its own metadata ({data_start} blocks)"
        )));
    }
    sb.nblocks = size - data_start;

    for lba in 0..size {
        crate::device::zero_block(device, lba)?;
    }

    {
        let mut handle = device.read(0)?;
        sb.encode(handle.data_mut());
        handle.mark_dirty();
        handle.flush()?;
    }

    mark_metadata_allocated(device, &sb, data_start)?;

    let mut template = DiskInode::ZERO;
    template.itype = InodeType::Dir;
    template.nlink = 1;
    template.size = 2 * DIRENT_SIZE as u32;

    let mut hint = data_start;
    let root_block = alloc::allocate(device, &sb, &mut hint)?;
    template.addrs[0] = root_block;

    let rootino = itable::ialloc(device, &sb, &template)?;
    if rootino != ROOTINO {
        return Err(FsError::Invalid(format!(
            "expected the root directory to land at inode {ROOTINO}, got {rootino}"
        )));
    }

    let mut handle = device.read(root_block)?;
    Dirent::new(rootino as u16, ".").encode(&mut handle.data_mut()[0..DIRENT_SIZE]);
    Dirent::new(rootino as u16, "..").encode(&mut handle.data_mut()[DIRENT_SIZE..2 * DIRENT_SIZE]);
    handle.mark_dirty();
    handle.flush()?;

    Ok(sb)
}

/// Mark every block before `data_start` (boot/super/log/inode/bitmap) as
/// allocated, so the allocator never hands one out (spec §3: "the engine
/// never allocates below `bmapstart + ceil(size/BPB)`").
fn mark_metadata_allocated<D: BlockDevice>(
    device: &D,
    sb: &SuperBlock,
    data_start: u32,
) -> FsResult<()> {
    let mut b = 0;
    while b < data_start {
        let bitmap_lba = sb.bitmap_block(b);
        let mut handle = device.read(bitmap_lba)?;
        let block_end = ((b / BPB) + 1) * BPB;
        let end = block_end.min(data_start);
        for cur in b..end {
            let (byte, mask) = alloc::bit_mask(cur % BPB);
            handle.data_mut()[byte] |= mask;
        }
        handle.mark_dirty();
        handle.flush()?;
        b = end;
    }
    Ok(())
}

//! Block allocator (component B, spec §4.2).
//!
//! Grounded on `examples/original_source/balloc.c`'s `xv6_balloc_unsafe` /
//! `xv6_balloc_rng` / `xv6_bfree_unsafe`, and on `LENSHOOD-xv6-rust`'s
//! `balloc`/`bfree` for the block-cache-backed Rust idiom.
//!
//! Callers are expected to serialize calls to this module under the
//! filesystem-wide bitmap/inode-table mutex (spec §5, lock #1); the `hint`
//! parameter is threaded through by reference rather than owned here so
//! that a single lock guard covers both the bitmap mutation and the hint
//! update, exactly as the reference driver's single `balloc_lock` does.

use log::warn;

use crate::device::{BlockDevice, BlockHandle};
use crate::error::{FsError, FsResult};
use crate::layout::{SuperBlock, BPB};

pub(crate) fn bit_mask(bit: u32) -> (usize, u8) {
    ((bit / 8) as usize, 1u8 << (bit % 8))
}

/// Allocate and zero a free data block, returning its LBA.
///
/// Scans `[*hint, size)` then wraps into `[data_start, *hint)`. The found
/// block is zeroed on disk *before* the bitmap bit is flipped, so a crash
/// between the two writes never leaves a block marked allocated while still
/// holding another file's stale data (spec §4.2 rationale).
pub fn allocate<D: BlockDevice>(device: &D, sb: &SuperBlock, hint: &mut u32) -> FsResult<u32> {
    if device.read_only() {
        return Err(FsError::ReadOnly);
    }
    let data_start = sb.data_start();
    let size = sb.size;

    if let Some(b) = try_claim(device, sb, *hint, size, hint)? {
        return Ok(b);
    }
    if let Some(b) = try_claim(device, sb, data_start, *hint, hint)? {
        return Ok(b);
    }
    Err(FsError::NoSpace)
}

/// Scan `[start, end)` for a clear bit, zero and claim the first one found.
/// On a zeroing failure, pins `*hint` at the failing block (so the next
/// caller retries it rather than skipping it permanently, matching
/// `xv6_balloc_rng`'s actual (not spec-prose's) behavior; see
/// DESIGN.md's Open Question decisions) and propagates the I/O error.
fn try_claim<D: BlockDevice>(
    device: &D,
    sb: &SuperBlock,
    start: u32,
    end: u32,
    hint: &mut u32,
) -> FsResult<Option<u32>> {
    let mut b = start;
    while b < end {
        let bitmap_lba = sb.bitmap_block(b);
        let block_end = ((b / BPB) + 1) * BPB;
        let scan_end = block_end.min(end);

        let mut handle = device.read(bitmap_lba)?;
        let mut found = None;
        {
            let mut cur = b;
            while cur < scan_end {
                let (byte, mask) = bit_mask(cur % BPB);
                if handle.data()[byte] & mask == 0 {
                    found = Some(cur);
                    break;
                }
                cur += 1;
            }
        }

        let Some(candidate) = found else {
            b = scan_end;
            continue;
        };

        if let Err(e) = crate::device::zero_block(device, candidate) {
            *hint = candidate;
            return Err(e);
        }

        let (byte, mask) = bit_mask(candidate % BPB);
        handle.data_mut()[byte] |= mask;
        handle.mark_dirty();
        handle.flush()?;

        *hint = if candidate + 1 >= end_of_data(sb) {
            sb.data_start()
        } else {
            candidate + 1
        };
        return Ok(Some(candidate));
    }
    Ok(None)
}

fn end_of_data(sb: &SuperBlock) -> u32 {
    sb.size
}

/// Free block `b`. Idempotent: freeing an already-clear bit logs a warning
/// and returns `Ok(())` (spec's open question, resolved per
/// `original_source/balloc.c`: no escalation to `Invalid`).
pub fn free<D: BlockDevice>(device: &D, sb: &SuperBlock, b: u32) -> FsResult<()> {
    if device.read_only() {
        return Err(FsError::ReadOnly);
    }
    debug_assert!(
        b >= sb.data_start() && b < sb.size,
        "free() called on a block outside the data region: {b}"
    );

    let bitmap_lba = sb.bitmap_block(b);
    let mut handle = device.read(bitmap_lba)?;
    let (byte, mask) = bit_mask(b % BPB);
    if handle.data()[byte] & mask == 0 {
        warn!("double free detected on block {b}");
        return Ok(());
    }
    handle.data_mut()[byte] &= !mask;
    handle.mark_dirty();
    handle.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_device::MemDevice;

    fn sb_for(size: u32, ninodes: u32) -> SuperBlock {
        let nlog = 4;
        let inodestart = 1 + nlog;
        let mut sb = SuperBlock {
            magic: crate::layout::FSMAGIC,
            size,
            nblocks: 0,
            ninodes,
            nlog,
            logstart: 1,
            inodestart,
            bmapstart: 0,
        };
        sb.bmapstart = inodestart + sb.inode_blocks();
        sb.nblocks = size - sb.data_start();
        sb
    }

    #[test]
    fn allocate_then_free_restores_bitmap() {
        let dev = MemDevice::new(64);
        let sb = sb_for(64, 32);
        let mut hint = sb.data_start();

        let before = dev.snapshot_bitmap(&sb);
        let b = allocate(&dev, &sb, &mut hint).unwrap();
        assert!(b >= sb.data_start());
        free(&dev, &sb, b).unwrap();
        let after = dev.snapshot_bitmap(&sb);
        assert_eq!(before, after);
    }

    #[test]
    fn allocate_never_returns_below_data_start() {
        let dev = MemDevice::new(64);
        let sb = sb_for(64, 32);
        let mut hint = sb.data_start();
        for _ in 0..(sb.size - sb.data_start()) {
            let b = allocate(&dev, &sb, &mut hint).unwrap();
            assert!(b >= sb.data_start() && b < sb.size);
        }
        assert!(matches!(
            allocate(&dev, &sb, &mut hint),
            Err(FsError::NoSpace)
        ));
    }

    #[test]
    fn allocated_block_is_zeroed() {
        let dev = MemDevice::new(64);
        let sb = sb_for(64, 32);
        let mut hint = sb.data_start();
        dev.poison(sb.data_start());
        let b = allocate(&dev, &sb, &mut hint).unwrap();
        assert_eq!(b, sb.data_start());
        assert!(dev.read(b).unwrap().data().iter().all(|&x| x == 0));
    }

    #[test]
    fn double_free_is_idempotent() {
        let dev = MemDevice::new(64);
        let sb = sb_for(64, 32);
        free(&dev, &sb, sb.data_start()).unwrap();
        free(&dev, &sb, sb.data_start()).unwrap();
    }

    #[test]
    fn read_only_rejects_mutation() {
        let dev = MemDevice::new(64).read_only();
        let sb = sb_for(64, 32);
        let mut hint = sb.data_start();
        assert!(matches!(
            allocate(&dev, &sb, &mut hint),
            Err(FsError::ReadOnly)
        ));
        assert!(matches!(
            free(&dev, &sb, sb.data_start()),
            Err(FsError::ReadOnly)
        ));
    }
}

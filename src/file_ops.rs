//! File data read/write (component F, spec §4.6).
//!
//! Grounded on `examples/original_source/file.c`'s `xv6_file_block`-driven
//! read/write path and `LENSHOOD-xv6-rust`'s `readi`/`writei`, re-expressed
//! over safe `&[u8]`/`&mut [u8]` slices instead of raw user/kernel
//! pointers (the user/kernel copy distinction the reference driver makes,
//! `is_user_dst`/`either_copyout`, belongs to a host integration layer
//! this crate does not model; spec §1 Non-goals).

use crate::blockmap;
use crate::device::{BlockDevice, BlockHandle};
use crate::dinode::DiskInode;
use crate::error::{FsError, FsResult};
use crate::layout::{SuperBlock, BSIZE, MAXFILE};

/// Read up to `dst.len()` bytes starting at byte offset `off`, stopping at
/// the inode's `size` and returning the number of bytes actually read.
/// A logical hole (an unallocated block within `size`) reads as zeros.
///
/// A block-read failure after some bytes were already produced returns the
/// short count rather than the error (spec §4.6, §7): the error is only
/// propagated when it strikes before anything has been read.
pub fn read<D: BlockDevice>(
    device: &D,
    inode: &DiskInode,
    off: u32,
    dst: &mut [u8],
) -> FsResult<usize> {
    if off > inode.size {
        return Ok(0);
    }
    let n = (dst.len() as u64).min((inode.size - off) as u64) as usize;

    let mut tot = 0;
    while tot < n {
        let cur_off = off + tot as u32;
        let block_idx = cur_off / BSIZE as u32;
        let in_block = cur_off as usize % BSIZE;
        let chunk = (n - tot).min(BSIZE - in_block);

        let step: FsResult<()> = (|| {
            match blockmap::read_addr(device, inode, block_idx)? {
                Some(lba) => {
                    let handle = device.read(lba)?;
                    dst[tot..tot + chunk]
                        .copy_from_slice(&handle.data()[in_block..in_block + chunk]);
                }
                None => {
                    dst[tot..tot + chunk].fill(0);
                }
            }
            Ok(())
        })();

        if let Err(e) = step {
            return if tot > 0 { Ok(tot) } else { Err(e) };
        }
        tot += chunk;
    }
    Ok(tot)
}

/// Write `src` at byte offset `off`, allocating blocks as needed and
/// growing `inode.size` if the write extends past the current end.
/// Returns the number of bytes written.
///
/// On a partial failure, the blocks written so far are committed, `size`
/// is advanced to cover them, and the short count is returned rather than
/// the error (spec §4.6, §7): the error only propagates when it strikes
/// before anything has been written.
pub fn write<D: BlockDevice>(
    device: &D,
    sb: &SuperBlock,
    inode: &mut DiskInode,
    off: u32,
    src: &[u8],
    hint: &mut u32,
) -> FsResult<usize> {
    if device.read_only() {
        return Err(FsError::ReadOnly);
    }
    let end = off
        .checked_add(src.len() as u32)
        .ok_or(FsError::FileTooBig {
            index: (MAXFILE) as u32,
        })?;
    if end as u64 > (MAXFILE * BSIZE) as u64 {
        return Err(FsError::FileTooBig {
            index: end / BSIZE as u32,
        });
    }

    let mut tot = 0usize;
    let mut first_err = None;
    while tot < src.len() {
        let cur_off = off + tot as u32;
        let block_idx = cur_off / BSIZE as u32;
        let in_block = cur_off as usize % BSIZE;
        let chunk = (src.len() - tot).min(BSIZE - in_block);

        let step: FsResult<()> = (|| {
            let lba = blockmap::write_addr(device, sb, inode, block_idx, hint)?;
            let mut handle = device.read(lba)?;
            handle.data_mut()[in_block..in_block + chunk].copy_from_slice(&src[tot..tot + chunk]);
            handle.mark_dirty();
            handle.flush()
        })();

        match step {
            Ok(()) => tot += chunk,
            Err(e) => {
                first_err = Some(e);
                break;
            }
        }
    }

    let new_off = off + tot as u32;
    if new_off > inode.size {
        inode.size = new_off;
    }

    match first_err {
        Some(e) if tot == 0 => Err(e),
        _ => Ok(tot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FSMAGIC, NDIRECT};
    use crate::mem_device::MemDevice;

    fn sb_for(size: u32, ninodes: u32) -> SuperBlock {
        let nlog = 4;
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
        sb.nblocks = size - sb.data_start();
        sb
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dev = MemDevice::new(2048);
        let sb = sb_for(2048, 256);
        let mut hint = sb.data_start();
        let mut inode = DiskInode::ZERO;

        let payload = b"hello xv6 filesystem";
        let n = write(&dev, &sb, &mut inode, 10, payload, &mut hint).unwrap();
        assert_eq!(n, payload.len());
        assert_eq!(inode.size, 10 + payload.len() as u32);

        let mut out = vec![0u8; payload.len()];
        let got = read(&dev, &inode, 10, &mut out).unwrap();
        assert_eq!(got, payload.len());
        assert_eq!(&out, payload);
    }

    #[test]
    fn read_of_hole_returns_zeros() {
        let dev = MemDevice::new(2048);
        let sb = sb_for(2048, 256);
        let mut hint = sb.data_start();
        let mut inode = DiskInode::ZERO;
        write(&dev, &sb, &mut inode, 2000, b"tail", &mut hint).unwrap();

        let mut out = vec![0xFFu8; 10];
        let got = read(&dev, &inode, 0, &mut out).unwrap();
        assert_eq!(got, 10);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_crossing_into_indirect_blocks_is_readable() {
        let dev = MemDevice::new(8192);
        let sb = sb_for(8192, 256);
        let mut hint = sb.data_start();
        let mut inode = DiskInode::ZERO;

        let off = (NDIRECT as u32) * BSIZE as u32 - 5;
        let payload = [7u8; 20];
        write(&dev, &sb, &mut inode, off, &payload, &mut hint).unwrap();

        let mut out = [0u8; 20];
        read(&dev, &inode, off, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn read_past_size_is_clamped() {
        let dev = MemDevice::new(2048);
        let sb = sb_for(2048, 256);
        let mut hint = sb.data_start();
        let mut inode = DiskInode::ZERO;
        write(&dev, &sb, &mut inode, 0, b"short", &mut hint).unwrap();

        let mut out = [0u8; 100];
        let got = read(&dev, &inode, 0, &mut out).unwrap();
        assert_eq!(got, 5);
    }
}

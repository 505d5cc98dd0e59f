//! Directory iterator (component D, spec §4.4).
//!
//! Grounded on `examples/original_source/dir.c`'s `xv6_dir_iterate` callers
//! (`de_find_callback`, `de_insert_callback`, `de_erase_callback`,
//! `rmtest_callback`, `readdir_callback`): each walks the same block-by-block
//! scan over a directory's dirents and differs only in what it does with
//! each entry. That visitor/action-record pattern is carried over directly,
//! re-expressed as a generic `FnMut` closure rather than a `void *ctx` plus
//! a dispatch table (spec Design Notes §9).

use crate::blockmap;
use crate::device::{BlockDevice, BlockHandle};
use crate::dinode::{DiskInode, Dirent};
use crate::error::FsResult;
use crate::layout::{SuperBlock, DIRENTS_PER_BLOCK, DIRENT_SIZE};

/// What the visitor wants done with the entry it was just handed, and
/// whether to keep scanning.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirAction {
    /// Keep scanning past this entry.
    pub cont: bool,
    /// Write the (possibly mutated) entry back to disk.
    pub de_dirty: bool,
    /// This entry was materialized past the directory's previous end;
    /// grow `size` to cover it.
    pub dir_ext: bool,
}

impl DirAction {
    pub const STOP: DirAction = DirAction {
        cont: false,
        de_dirty: false,
        dir_ext: false,
    };
    pub const CONTINUE: DirAction = DirAction {
        cont: true,
        de_dirty: false,
        dir_ext: false,
    };
}

/// Walk `dir`'s entries starting at logical slot `start`, calling `visit`
/// on each. If `allow_extend` is set, scanning continues past the
/// directory's current end by materializing fresh (zeroed) dirent slots;
/// used by insertion, which wants to find either a reusable empty slot or
/// the directory's tail. Without `allow_extend`, the walk stops at `size`.
pub fn iterate<D: BlockDevice>(
    device: &D,
    sb: &SuperBlock,
    inode: &mut DiskInode,
    hint: &mut u32,
    start: u32,
    allow_extend: bool,
    mut visit: impl FnMut(u32, &mut Dirent) -> DirAction,
) -> FsResult<()> {
    let mut dnum = start;
    loop {
        let within_size = (dnum as u64) * (DIRENT_SIZE as u64) < inode.size as u64;
        if !within_size && !allow_extend {
            return Ok(());
        }

        let block_idx = dnum / DIRENTS_PER_BLOCK;
        let offset = ((dnum % DIRENTS_PER_BLOCK) * DIRENT_SIZE as u32) as usize;

        let lba = if within_size {
            match blockmap::read_addr(device, inode, block_idx)? {
                Some(lba) => lba,
                // A hole inside an existing directory reads as an all-zero
                // (i.e. empty) entry rather than an error.
                None => {
                    let mut de = Dirent::EMPTY;
                    let action = visit(dnum, &mut de);
                    if !action.cont {
                        return Ok(());
                    }
                    dnum += 1;
                    continue;
                }
            }
        } else {
            blockmap::write_addr(device, sb, inode, block_idx, hint)?
        };

        let mut handle = device.read(lba)?;
        let mut de = Dirent::decode(&handle.data()[offset..offset + DIRENT_SIZE])?;

        let action = visit(dnum, &mut de);

        if action.de_dirty {
            de.encode(&mut handle.data_mut()[offset..offset + DIRENT_SIZE]);
            handle.mark_dirty();
            handle.flush()?;
        }
        if action.dir_ext && !within_size {
            inode.size = (dnum + 1) * DIRENT_SIZE as u32;
        }
        if !action.cont {
            return Ok(());
        }
        dnum += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FSMAGIC;
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
    fn insert_extends_directory_and_is_findable() {
        let dev = MemDevice::new(256);
        let sb = sb_for(256, 64);
        let mut hint = sb.data_start();
        let mut dir = DiskInode::ZERO;

        iterate(&dev, &sb, &mut dir, &mut hint, 0, true, |_dnum, de| {
            if de.inum == 0 {
                *de = Dirent::new(5, "foo");
                return DirAction {
                    cont: false,
                    de_dirty: true,
                    dir_ext: true,
                };
            }
            DirAction::CONTINUE
        })
        .unwrap();
        assert_eq!(dir.size, DIRENT_SIZE as u32);

        let mut found = None;
        iterate(&dev, &sb, &mut dir, &mut hint, 0, false, |dnum, de| {
            if de.name_matches("foo") {
                found = Some(dnum);
                return DirAction::STOP;
            }
            DirAction::CONTINUE
        })
        .unwrap();
        assert_eq!(found, Some(0));
    }

    #[test]
    fn erase_clears_entry_without_shrinking_size() {
        let dev = MemDevice::new(256);
        let sb = sb_for(256, 64);
        let mut hint = sb.data_start();
        let mut dir = DiskInode::ZERO;

        iterate(&dev, &sb, &mut dir, &mut hint, 0, true, |_dnum, de| {
            *de = Dirent::new(9, "bar");
            DirAction {
                cont: false,
                de_dirty: true,
                dir_ext: true,
            }
        })
        .unwrap();
        let size_before = dir.size;

        let mut erased = false;
        iterate(&dev, &sb, &mut dir, &mut hint, 0, false, |_dnum, de| {
            if de.name_matches("bar") {
                *de = Dirent::EMPTY;
                erased = true;
                return DirAction {
                    cont: false,
                    de_dirty: true,
                    dir_ext: false,
                };
            }
            DirAction::CONTINUE
        })
        .unwrap();
        assert!(erased);
        assert_eq!(dir.size, size_before);

        let mut still_found = false;
        iterate(&dev, &sb, &mut dir, &mut hint, 0, false, |_dnum, de| {
            if de.name_matches("bar") {
                still_found = true;
                return DirAction::STOP;
            }
            DirAction::CONTINUE
        })
        .unwrap();
        assert!(!still_found);
    }

    #[test]
    fn empty_directory_iterate_stops_immediately_when_not_extending() {
        let dev = MemDevice::new(256);
        let sb = sb_for(256, 64);
        let mut hint = sb.data_start();
        let mut dir = DiskInode::ZERO;
        let mut visits = 0;
        iterate(&dev, &sb, &mut dir, &mut hint, 0, false, |_, _| {
            visits += 1;
            DirAction::CONTINUE
        })
        .unwrap();
        assert_eq!(visits, 0);
    }
}

//! Directory operations (component G, spec §4.7): lookup, create, link,
//! unlink, rmdir, readdir and rename, built on the directory iterator (D)
//! and inode table (E).
//!
//! Grounded on `examples/original_source/dir.c`'s `xv6_find_inum`,
//! `xv6_dentry_insert`, `xv6_dir_erase`, `xv6_dir_rmtest`, `xv6_rmdir`, and
//! `inode.c`'s `xv6_create`.

use std::sync::Arc;

use crate::device::{BlockDevice, BlockHandle};
use crate::diriter::{self, DirAction};
use crate::dinode::{DiskInode, Dirent, InodeType};
use crate::error::{FsError, FsResult};
use crate::file_ops;
use crate::itable::{self, Inode, ITable};
use crate::layout::{SuperBlock, DIRENT_SIZE, DIRSIZ, ROOTINO};

fn reject_dot_names(name: &str) -> FsResult<()> {
    if name == "." || name == ".." {
        return Err(FsError::Exists { name: name.into() });
    }
    Ok(())
}

fn check_name_len(name: &str) -> FsResult<()> {
    if name.len() > DIRSIZ {
        return Err(FsError::NameTooLong { name: name.into() });
    }
    Ok(())
}

fn require_dir(data: &DiskInode, inum: u32) -> FsResult<()> {
    if data.itype != InodeType::Dir {
        return Err(FsError::NotDir { inum });
    }
    Ok(())
}

/// Find `name` in `dir`, returning the matching inode (fetched/cached via
/// `itable`) or `None` if there is no such entry.
pub fn lookup<D: BlockDevice>(
    device: &D,
    itable: &ITable,
    sb: &SuperBlock,
    dir: &Inode,
    name: &str,
) -> FsResult<Option<Arc<Inode>>> {
    let mut data = dir.data.write().unwrap();
    require_dir(&data, dir.inum)?;

    let mut hit = None;
    let mut unused_hint = 0;
    diriter::iterate(device, sb, &mut data, &mut unused_hint, 0, false, |_dnum, de| {
        if de.inum != 0 && de.name_matches(name) {
            hit = Some(de.inum as u32);
            return DirAction::STOP;
        }
        DirAction::CONTINUE
    })?;
    drop(data);

    match hit {
        Some(inum) => Ok(Some(itable.get(device, sb, inum)?)),
        None => Ok(None),
    }
}

/// Insert `name -> inum` into `dir`, reusing a cleared slot if one exists
/// or extending the directory otherwise. Fails with `Exists` if the name
/// is already bound; callers that want "create or fail" semantics should
/// check this before allocating a new inode.
fn insert<D: BlockDevice>(
    device: &D,
    sb: &SuperBlock,
    dir: &mut DiskInode,
    name: &str,
    inum: u32,
    hint: &mut u32,
) -> FsResult<()> {
    check_name_len(name)?;
    reject_dot_names(name)?;

    let new_de = Dirent::new(inum as u16, name);
    diriter::iterate(device, sb, dir, hint, 0, true, move |_dnum, de| {
        if de.inum == 0 {
            *de = new_de;
            return DirAction {
                cont: false,
                de_dirty: true,
                dir_ext: true,
            };
        }
        DirAction::CONTINUE
    })
}

/// Create a new file or directory named `name` inside `dir`.
///
/// Builds a fresh dinode image, pre-allocates its first data block (and,
/// for a directory, seeds it with `.`/`..`), writes it into the inode
/// table, then links it into `dir`. Any failure along the way rolls back
/// the inode and block allocations it already made.
pub fn create<D: BlockDevice>(
    device: &D,
    itable: &ITable,
    sb: &SuperBlock,
    dir: &Inode,
    name: &str,
    itype: InodeType,
    hint: &mut u32,
) -> FsResult<Arc<Inode>> {
    check_name_len(name)?;
    reject_dot_names(name)?;
    require_dir(&dir.data.read().unwrap(), dir.inum)?;

    if lookup(device, itable, sb, dir, name)?.is_some() {
        return Err(FsError::Exists { name: name.into() });
    }

    let mut template = DiskInode::ZERO;
    template.itype = itype;
    template.nlink = 1;
    if itype == InodeType::Dir {
        template.size = 2 * DIRENT_SIZE as u32;
    }

    let first_block = crate::alloc::allocate(device, sb, hint)?;
    template.addrs[0] = first_block;

    let inum = match itable::ialloc(device, sb, &template) {
        Ok(inum) => inum,
        Err(e) => {
            let _ = crate::alloc::free(device, sb, first_block);
            return Err(e);
        }
    };

    if itype == InodeType::Dir {
        if let Err(e) = init_dir_block(device, first_block, dir.inum, inum) {
            let _ = itable::ifree(device, sb, inum);
            let _ = crate::alloc::free(device, sb, first_block);
            return Err(e);
        }
    }

    let mut parent_data = dir.data.write().unwrap();
    if let Err(e) = insert(device, sb, &mut parent_data, name, inum, hint) {
        drop(parent_data);
        let _ = itable::ifree(device, sb, inum);
        let _ = crate::alloc::free(device, sb, first_block);
        return Err(e);
    }
    drop(parent_data);
    itable.sync(device, sb, dir)?;

    itable.get(device, sb, inum)
}

fn init_dir_block<D: BlockDevice>(
    device: &D,
    block: u32,
    parent_inum: u32,
    this_inum: u32,
) -> FsResult<()> {
    let mut handle = device.read(block)?;
    Dirent::new(this_inum as u16, ".").encode(&mut handle.data_mut()[0..DIRENT_SIZE]);
    Dirent::new(parent_inum as u16, "..").encode(&mut handle.data_mut()[DIRENT_SIZE..2 * DIRENT_SIZE]);
    handle.mark_dirty();
    handle.flush()
}

/// Bind an additional name to an already-existing inode (a hard link):
/// insert the directory entry, then bump `nlink`.
pub fn link<D: BlockDevice>(
    device: &D,
    itable: &ITable,
    sb: &SuperBlock,
    dir: &Inode,
    name: &str,
    target: &Inode,
    hint: &mut u32,
) -> FsResult<()> {
    if target.data.read().unwrap().nlink == i16::MAX as u16 {
        return Err(FsError::TooManyLinks { inum: target.inum });
    }

    let mut parent_data = dir.data.write().unwrap();
    require_dir(&parent_data, dir.inum)?;
    insert(device, sb, &mut parent_data, name, target.inum, hint)?;
    drop(parent_data);
    itable.sync(device, sb, dir)?;

    let mut data = target.data.write().unwrap();
    data.nlink += 1;
    drop(data);
    itable.sync(device, sb, target)
}

/// Remove the directory entry `name` in `dir` and decrement the target
/// inode's link count, freeing it if that drops to zero. Refuses to
/// unlink the root directory or `.`/`..`.
pub fn unlink<D: BlockDevice>(
    device: &D,
    itable: &ITable,
    sb: &SuperBlock,
    dir: &Inode,
    name: &str,
) -> FsResult<()> {
    reject_dot_names(name)?;

    let mut data = dir.data.write().unwrap();
    require_dir(&data, dir.inum)?;

    let mut found_inum = None;
    let mut unused_hint = 0;
    diriter::iterate(device, sb, &mut data, &mut unused_hint, 0, false, |_dnum, de| {
        if de.inum != 0 && de.name_matches(name) {
            found_inum = Some(de.inum as u32);
            return DirAction::STOP;
        }
        DirAction::CONTINUE
    })?;
    let target_inum = found_inum.ok_or_else(|| FsError::NotFound { name: name.into() })?;
    if target_inum == ROOTINO {
        return Err(FsError::Busy);
    }

    let mut unused_hint = 0;
    diriter::iterate(device, sb, &mut data, &mut unused_hint, 0, false, |_dnum, de| {
        if de.inum != 0 && de.name_matches(name) {
            *de = Dirent::EMPTY;
            return DirAction {
                cont: false,
                de_dirty: true,
                dir_ext: false,
            };
        }
        DirAction::CONTINUE
    })?;
    drop(data);
    itable.sync(device, sb, dir)?;

    let target = itable.get(device, sb, target_inum)?;
    {
        let mut tdata = target.data.write().unwrap();
        tdata.nlink = tdata.nlink.saturating_sub(1);
    }
    itable.put(device, sb, target)
}

/// Check whether `dir` has any entry besides `.`/`..`.
fn is_empty<D: BlockDevice>(device: &D, sb: &SuperBlock, dir: &Inode) -> FsResult<bool> {
    let mut data = dir.data.write().unwrap();
    let mut empty = true;
    let mut unused_hint = 0;
    diriter::iterate(device, sb, &mut data, &mut unused_hint, 2, false, |_dnum, de| {
        if de.inum != 0 {
            empty = false;
            return DirAction::STOP;
        }
        DirAction::CONTINUE
    })?;
    Ok(empty)
}

/// Remove an empty subdirectory named `name` from `dir`.
pub fn rmdir<D: BlockDevice>(
    device: &D,
    itable: &ITable,
    sb: &SuperBlock,
    dir: &Inode,
    name: &str,
) -> FsResult<()> {
    let target = lookup(device, itable, sb, dir, name)?
        .ok_or_else(|| FsError::NotFound { name: name.into() })?;
    require_dir(&target.data.read().unwrap(), target.inum)?;
    if !is_empty(device, sb, &target)? {
        return Err(FsError::NotEmpty { inum: target.inum });
    }
    unlink(device, itable, sb, dir, name)
}

/// List every occupied entry in `dir` as `(inum, name)` pairs, in on-disk
/// order.
pub fn readdir<D: BlockDevice>(
    device: &D,
    sb: &SuperBlock,
    dir: &Inode,
) -> FsResult<Vec<(u32, String)>> {
    let mut data = dir.data.write().unwrap();
    require_dir(&data, dir.inum)?;
    let mut out = Vec::new();
    let mut unused_hint = 0;
    diriter::iterate(device, sb, &mut data, &mut unused_hint, 0, false, |_dnum, de| {
        if de.inum != 0 {
            out.push((de.inum as u32, de.name_str().to_string()));
        }
        DirAction::CONTINUE
    })?;
    Ok(out)
}

/// Rename `old_name` to `new_name` within the same directory: insert the
/// new binding for the same inode, then erase the old one. Implemented as
/// insert-then-erase under the caller-held directory lock (spec §4.7).
pub fn rename<D: BlockDevice>(
    device: &D,
    itable: &ITable,
    sb: &SuperBlock,
    dir: &Inode,
    old_name: &str,
    new_name: &str,
    hint: &mut u32,
) -> FsResult<()> {
    check_name_len(new_name)?;
    reject_dot_names(old_name)?;
    reject_dot_names(new_name)?;

    let mut data = dir.data.write().unwrap();
    require_dir(&data, dir.inum)?;

    let mut found_inum = None;
    let mut unused_hint = 0;
    diriter::iterate(device, sb, &mut data, &mut unused_hint, 0, false, |_dnum, de| {
        if de.inum != 0 && de.name_matches(old_name) {
            found_inum = Some(de.inum as u32);
            return DirAction::STOP;
        }
        DirAction::CONTINUE
    })?;
    let inum = found_inum.ok_or_else(|| FsError::NotFound {
        name: old_name.into(),
    })?;

    let mut dup_check = None;
    diriter::iterate(device, sb, &mut data, &mut unused_hint, 0, false, |_dnum, de| {
        if de.inum != 0 && de.name_matches(new_name) {
            dup_check = Some(());
            return DirAction::STOP;
        }
        DirAction::CONTINUE
    })?;
    if dup_check.is_some() {
        return Err(FsError::Exists {
            name: new_name.into(),
        });
    }

    insert(device, sb, &mut data, new_name, inum, hint)?;
    diriter::iterate(device, sb, &mut data, &mut unused_hint, 0, false, |_dnum, de| {
        if de.inum != 0 && de.name_matches(old_name) {
            *de = Dirent::EMPTY;
            return DirAction {
                cont: false,
                de_dirty: true,
                dir_ext: false,
            };
        }
        DirAction::CONTINUE
    })?;
    drop(data);
    itable.sync(device, sb, dir)
}

pub use file_ops::{read as read_file, write as write_file};

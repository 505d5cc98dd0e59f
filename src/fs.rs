//! Top-level filesystem handle tying together the block device, the
//! on-disk layout, the allocator's rotating hint, and the inode cache
//! (spec §5, §6's `fill_super`).
//!
//! Grounded on `LENSHOOD-xv6-rust/kernel/src/fs/mod.rs`'s `Superblock`
//! holder and `fs.rs`'s module-level locks, re-expressed as an owned
//! struct rather than global statics: this crate has no single kernel
//! instance, so the per-mount state lives on a value the host owns.

use std::sync::{Arc, Mutex};

use log::info;

use crate::device::{BlockDevice, BlockHandle};
use crate::dinode::InodeType;
use crate::dir_ops;
use crate::error::{FsError, FsResult};
use crate::itable::{Inode, ITable};
use crate::layout::{SuperBlock, ROOTINO};

/// Mount-time options, recognized case-sensitively (spec §6). Unknown
/// keys are rejected by [`MountOptions::parse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MountOptions {
    pub uid: u32,
    pub gid: u32,
}

impl MountOptions {
    /// Parse `key=value,key=value` mount option text.
    pub fn parse(text: &str) -> FsResult<Self> {
        let mut opts = MountOptions::default();
        if text.is_empty() {
            return Ok(opts);
        }
        for kv in text.split(',') {
            let (key, value) = kv
                .split_once('=')
                .ok_or_else(|| FsError::Invalid(format!("malformed mount option {kv:?}")))?;
            let value: u32 = value
                .parse()
                .map_err(|_| FsError::Invalid(format!("non-numeric mount option value {kv:?}")))?;
            match key {
                "uid" => opts.uid = value,
                "gid" => opts.gid = value,
                other => return Err(FsError::Invalid(format!("unknown mount option {other:?}"))),
            }
        }
        Ok(opts)
    }
}

/// State guarded by the filesystem-wide mutex (spec §5, lock #1): the
/// allocator's rotating hint and nothing else; the on-disk bitmap and
/// inode-table scans it brackets take their own block-level locking
/// through the block device.
struct MetaState {
    balloc_hint: u32,
}

/// A mounted filesystem: owns the block device, the immutable superblock,
/// the allocator hint behind the filesystem-wide mutex, and the inode
/// cache behind its own mutex (spec §5, locks #1 and #2).
pub struct Filesystem<D: BlockDevice> {
    device: D,
    pub sb: SuperBlock,
    pub options: MountOptions,
    meta: Mutex<MetaState>,
    itable: ITable,
}

impl<D: BlockDevice> Filesystem<D> {
    /// Read the superblock from `device`, validate the layout, and return
    /// a mounted filesystem handle (spec §6 `fill_super`).
    pub fn fill_super(device: D, options: MountOptions) -> FsResult<Self> {
        let handle = device.read(0)?;
        let sb = SuperBlock::decode(handle.data())?;
        drop(handle);

        if sb.magic != crate::layout::FSMAGIC {
            return Err(FsError::Invalid(format!(
                "bad superblock magic {:#010x}",
                sb.magic
            )));
        }
        let issues = sb.layout_mismatches();
        if !issues.is_empty() {
            return Err(FsError::Invalid(issues.join("; ")));
        }

        info!(
            "mounted xv6fs image: {} blocks, {} inodes, data starts at {}",
            sb.size,
            sb.ninodes,
            sb.data_start()
        );

        Ok(Filesystem {
            device,
            sb,
            options,
            meta: Mutex::new(MetaState {
                balloc_hint: sb.data_start(),
            }),
            itable: ITable::new(),
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn root(&self) -> FsResult<Arc<Inode>> {
        self.itable.get(&self.device, &self.sb, ROOTINO)
    }

    pub fn get_inode(&self, inum: u32) -> FsResult<Arc<Inode>> {
        self.itable.get(&self.device, &self.sb, inum)
    }

    pub fn put_inode(&self, inode: Arc<Inode>) -> FsResult<()> {
        self.itable.put(&self.device, &self.sb, inode)
    }

    pub fn lookup(&self, dir: &Inode, name: &str) -> FsResult<Option<Arc<Inode>>> {
        dir_ops::lookup(&self.device, &self.itable, &self.sb, dir, name)
    }

    pub fn create(&self, dir: &Inode, name: &str, itype: InodeType) -> FsResult<Arc<Inode>> {
        let mut meta = self.meta.lock().unwrap();
        dir_ops::create(
            &self.device,
            &self.itable,
            &self.sb,
            dir,
            name,
            itype,
            &mut meta.balloc_hint,
        )
    }

    pub fn link(&self, dir: &Inode, name: &str, target: &Inode) -> FsResult<()> {
        let mut meta = self.meta.lock().unwrap();
        dir_ops::link(
            &self.device,
            &self.itable,
            &self.sb,
            dir,
            name,
            target,
            &mut meta.balloc_hint,
        )
    }

    pub fn unlink(&self, dir: &Inode, name: &str) -> FsResult<()> {
        dir_ops::unlink(&self.device, &self.itable, &self.sb, dir, name)
    }

    pub fn rmdir(&self, dir: &Inode, name: &str) -> FsResult<()> {
        dir_ops::rmdir(&self.device, &self.itable, &self.sb, dir, name)
    }

    pub fn readdir(&self, dir: &Inode) -> FsResult<Vec<(u32, String)>> {
        dir_ops::readdir(&self.device, &self.sb, dir)
    }

    pub fn rename(&self, dir: &Inode, old_name: &str, new_name: &str) -> FsResult<()> {
        let mut meta = self.meta.lock().unwrap();
        dir_ops::rename(
            &self.device,
            &self.itable,
            &self.sb,
            dir,
            old_name,
            new_name,
            &mut meta.balloc_hint,
        )
    }

    pub fn read(&self, inode: &Inode, off: u32, dst: &mut [u8]) -> FsResult<usize> {
        let data = inode.data.read().unwrap();
        crate::file_ops::read(&self.device, &data, off, dst)
    }

    pub fn write(&self, inode: &Inode, off: u32, src: &[u8]) -> FsResult<usize> {
        let mut meta = self.meta.lock().unwrap();
        let mut data = inode.data.write().unwrap();
        let n = crate::file_ops::write(
            &self.device,
            &self.sb,
            &mut data,
            off,
            src,
            &mut meta.balloc_hint,
        )?;
        drop(data);
        drop(meta);
        self.itable.sync(&self.device, &self.sb, inode)?;
        Ok(n)
    }

    pub fn truncate(&self, inode: &Inode) -> FsResult<()> {
        let mut data = inode.data.write().unwrap();
        crate::blockmap::truncate(&self.device, &self.sb, &mut data)?;
        drop(data);
        self.itable.sync(&self.device, &self.sb, inode)
    }
}

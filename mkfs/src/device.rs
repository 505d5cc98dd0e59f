//! A [`BlockDevice`] backed by a plain file, sized up front to hold a
//! fixed number of blocks.
//!
//! Grounded on `LENSHOOD-xv6-rust/mkfs/src/main.rs`'s `wsect`/`rsect`
//! (seek-then-read/write-exact at a block-aligned offset), re-expressed
//! as scoped handles instead of raw seek calls at every call site.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use xv6fs::error::{FsError, FsResult};
use xv6fs::layout::BSIZE;
use xv6fs::{BlockDevice, BlockHandle};

pub struct FileDevice {
    file: Rc<RefCell<File>>,
    nblocks: u32,
}

impl FileDevice {
    pub fn create(path: &Path, nblocks: u32) -> anyhow::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(nblocks as u64 * BSIZE as u64)?;
        Ok(FileDevice {
            file: Rc::new(RefCell::new(file)),
            nblocks,
        })
    }
}

pub struct FileHandle {
    file: Rc<RefCell<File>>,
    lba: u32,
    buf: [u8; BSIZE],
    dirty: bool,
}

impl BlockHandle for FileHandle {
    fn data(&self) -> &[u8; BSIZE] {
        &self.buf
    }

    fn data_mut(&mut self) -> &mut [u8; BSIZE] {
        &mut self.buf
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn flush(&mut self) -> FsResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut f = self.file.borrow_mut();
        f.seek(SeekFrom::Start(self.lba as u64 * BSIZE as u64))
            .map_err(|_| FsError::Io { block: self.lba })?;
        f.write_all(&self.buf)
            .map_err(|_| FsError::Io { block: self.lba })?;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl BlockDevice for FileDevice {
    type Handle = FileHandle;

    fn read(&self, lba: u32) -> FsResult<Self::Handle> {
        if lba >= self.nblocks {
            return Err(FsError::Io { block: lba });
        }
        let mut buf = [0u8; BSIZE];
        let mut f = self.file.borrow_mut();
        f.seek(SeekFrom::Start(lba as u64 * BSIZE as u64))
            .map_err(|_| FsError::Io { block: lba })?;
        f.read_exact(&mut buf)
            .map_err(|_| FsError::Io { block: lba })?;
        drop(f);
        Ok(FileHandle {
            file: self.file.clone(),
            lba,
            buf,
            dirty: false,
        })
    }

    fn read_only(&self) -> bool {
        false
    }
}

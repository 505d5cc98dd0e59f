//! A read-only [`BlockDevice`] over a memory-mapped image file.
//!
//! Grounded on `examples/original_source/xv6check.cpp`'s `checker_bread`
//! (returns a pointer straight into the mmap, bounds-checked against the
//! file size) and `check.h`'s `struct checker` capability vtable.

use std::fs::File;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use xv6fs::error::{FsError, FsResult};
use xv6fs::layout::BSIZE;
use xv6fs::{BlockDevice, BlockHandle};

pub struct MmapDevice {
    mmap: Mmap,
}

impl MmapDevice {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(MmapDevice { mmap })
    }

    pub fn nblocks(&self) -> u32 {
        (self.mmap.len() / BSIZE) as u32
    }

    pub fn byte_len(&self) -> usize {
        self.mmap.len()
    }
}

pub struct MmapHandle {
    buf: [u8; BSIZE],
    dirty: bool,
}

impl BlockHandle for MmapHandle {
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
        if self.dirty {
            // The checker never legitimately writes; a dirty flush would
            // mean a bug in the checking logic, not a recoverable
            // condition.
            return Err(FsError::ReadOnly);
        }
        Ok(())
    }
}

impl BlockDevice for MmapDevice {
    type Handle = MmapHandle;

    fn read(&self, lba: u32) -> FsResult<Self::Handle> {
        let start = lba as usize * BSIZE;
        let end = start + BSIZE;
        if end > self.mmap.len() {
            return Err(FsError::Io { block: lba });
        }
        let mut buf = [0u8; BSIZE];
        buf.copy_from_slice(&self.mmap[start..end]);
        Ok(MmapHandle { buf, dirty: false })
    }

    fn read_only(&self) -> bool {
        true
    }
}

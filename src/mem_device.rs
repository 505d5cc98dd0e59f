//! An in-memory [`BlockDevice`], used by the crate's own tests and
//! available to downstream integration tests that want a disk image
//! without touching the filesystem. Not part of the on-disk format; this
//! is purely test/tooling scaffolding (spec's "ambient stack", see
//! SPEC_FULL.md §1).

use std::cell::Cell;
use std::rc::Rc;

use crate::device::{BlockDevice, BlockHandle};
use crate::error::{FsError, FsResult};
use crate::layout::{SuperBlock, BSIZE};

#[derive(Clone)]
pub struct MemDevice {
    blocks: Rc<Vec<Cell<[u8; BSIZE]>>>,
    read_only: Rc<Cell<bool>>,
}

impl MemDevice {
    pub fn new(nblocks: u32) -> Self {
        let mut v = Vec::with_capacity(nblocks as usize);
        v.resize_with(nblocks as usize, || Cell::new([0u8; BSIZE]));
        MemDevice {
            blocks: Rc::new(v),
            read_only: Rc::new(Cell::new(false)),
        }
    }

    #[must_use]
    pub fn read_only(self) -> Self {
        self.read_only.set(true);
        self
    }

    pub fn set_read_only(&self, ro: bool) {
        self.read_only.set(ro);
    }

    pub fn nblocks(&self) -> u32 {
        self.blocks.len() as u32
    }

    /// Fill a block with a recognizable non-zero pattern, useful for
    /// asserting that an allocator zeroes a block before handing it out.
    pub fn poison(&self, lba: u32) {
        self.blocks[lba as usize].set([0xAA; BSIZE]);
    }

    /// Raw bytes backing the whole image, for dumping to a file (`mkfs`)
    /// or mmap-emulating in a test.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.blocks.len() * BSIZE);
        for c in self.blocks.iter() {
            out.extend_from_slice(&c.get());
        }
        out
    }

    pub fn snapshot_bitmap(&self, sb: &SuperBlock) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..sb.bitmap_blocks() {
            out.extend_from_slice(&self.blocks[(sb.bmapstart + i) as usize].get());
        }
        out
    }
}

pub struct MemHandle {
    blocks: Rc<Vec<Cell<[u8; BSIZE]>>>,
    lba: u32,
    buf: [u8; BSIZE],
    dirty: bool,
}

impl BlockHandle for MemHandle {
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
            self.blocks[self.lba as usize].set(self.buf);
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for MemHandle {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl BlockDevice for MemDevice {
    type Handle = MemHandle;

    fn read(&self, lba: u32) -> FsResult<Self::Handle> {
        if lba >= self.nblocks() {
            return Err(FsError::Io { block: lba });
        }
        Ok(MemHandle {
            blocks: self.blocks.clone(),
            lba,
            buf: self.blocks[lba as usize].get(),
            dirty: false,
        })
    }

    fn read_only(&self) -> bool {
        self.read_only.get()
    }
}

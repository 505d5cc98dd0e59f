//! The block I/O capability consumed by the engine (spec §4.1).
//!
//! A [`BlockDevice`] hands out scoped [`BlockHandle`]s: the handle borrows
//! (or owns a cached copy of) one block's bytes, supports marking it dirty
//! and flushing, and is released simply by dropping it: the RAII idiom
//! Rust gives us natively for the "deterministic release on every exit
//! path" requirement in spec Design Notes §9, without needing an explicit
//! `release()` call.

use crate::error::FsResult;
use crate::layout::BSIZE;

/// A scoped handle to one in-cache block.
pub trait BlockHandle {
    fn data(&self) -> &[u8; BSIZE];
    fn data_mut(&mut self) -> &mut [u8; BSIZE];
    fn mark_dirty(&mut self);
    /// Synchronous-commit barrier: write the block back if dirty.
    fn flush(&mut self) -> FsResult<()>;
}

/// Host-supplied block I/O capability.
pub trait BlockDevice {
    type Handle: BlockHandle;

    /// Read (or fetch from cache) the block at `lba`.
    fn read(&self, lba: u32) -> FsResult<Self::Handle>;

    /// Whether the device rejects mutation (spec §5 "read-only mode").
    fn read_only(&self) -> bool;
}

/// Zero a block: read it, clear its bytes, flush. Grounded on
/// `original_source/dir.c`'s `xv6_dir_init`/`balloc.c`'s `xv6_bzero`.
pub fn zero_block<D: BlockDevice>(dev: &D, lba: u32) -> FsResult<()> {
    let mut h = dev.read(lba)?;
    h.data_mut().fill(0);
    h.mark_dirty();
    h.flush()
}

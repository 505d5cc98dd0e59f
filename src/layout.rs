//! On-disk layout constants and the superblock.
//!
//! Disk layout: `[0]=superblock, [1..1+nlog)=log (reserved), inode table,
//! bitmap, then data blocks to `size-1`. See spec §3.

use crate::error::{FsError, FsResult};

/// Block size in bytes.
pub const BSIZE: usize = 1024;
/// Size of a packed on-disk inode record.
pub const DINODE_SIZE: usize = 2 + 2 + 2 + 2 + 4 + 4 * (NDIRECT + 1);
/// Size of a packed directory entry.
pub const DIRENT_SIZE: usize = 2 + DIRSIZ;
/// Inodes per block.
pub const IPB: u32 = (BSIZE / DINODE_SIZE) as u32;
/// Bits per bitmap block.
pub const BPB: u32 = (BSIZE * 8) as u32;
/// Direct block pointers per inode.
pub const NDIRECT: usize = 12;
/// Block numbers that fit in one indirect block.
pub const NINDIRECT: usize = BSIZE / 4;
/// Maximum file size, in blocks.
pub const MAXFILE: usize = NDIRECT + NINDIRECT;
/// Directory entry name length.
pub const DIRSIZ: usize = 14;
/// Root inode number.
pub const ROOTINO: u32 = 1;
/// Superblock magic.
pub const FSMAGIC: u32 = 0x1020_3040;
/// Dirents per block.
pub const DIRENTS_PER_BLOCK: u32 = (BSIZE / DIRENT_SIZE) as u32;

const _: () = assert!(BSIZE % DINODE_SIZE == 0, "dinode must divide BSIZE");
const _: () = assert!(BSIZE % DIRENT_SIZE == 0, "dirent must divide BSIZE");

/// The on-disk superblock (block 0). All fields little-endian on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub size: u32,
    pub nblocks: u32,
    pub ninodes: u32,
    pub nlog: u32,
    pub logstart: u32,
    pub inodestart: u32,
    pub bmapstart: u32,
}

impl SuperBlock {
    pub const ENCODED_LEN: usize = 8 * 4;

    pub fn decode(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(FsError::Invalid("superblock buffer too short".into()));
        }
        let f = |off: usize| u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        Ok(SuperBlock {
            magic: f(0),
            size: f(4),
            nblocks: f(8),
            ninodes: f(12),
            nlog: f(16),
            logstart: f(20),
            inodestart: f(24),
            bmapstart: f(28),
        })
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.nblocks.to_le_bytes());
        buf[12..16].copy_from_slice(&self.ninodes.to_le_bytes());
        buf[16..20].copy_from_slice(&self.nlog.to_le_bytes());
        buf[20..24].copy_from_slice(&self.logstart.to_le_bytes());
        buf[24..28].copy_from_slice(&self.inodestart.to_le_bytes());
        buf[28..32].copy_from_slice(&self.bmapstart.to_le_bytes());
    }

    /// Number of blocks occupied by the inode table.
    pub fn inode_blocks(&self) -> u32 {
        self.ninodes.div_ceil(IPB)
    }

    /// Number of blocks occupied by the free-space bitmap.
    pub fn bitmap_blocks(&self) -> u32 {
        self.size.div_ceil(BPB)
    }

    /// First data block.
    pub fn data_start(&self) -> u32 {
        self.bmapstart + self.bitmap_blocks()
    }

    /// Block containing inode `inum`.
    pub fn inode_block(&self, inum: u32) -> u32 {
        self.inodestart + inum / IPB
    }

    /// Block of the free bitmap containing the bit for block `b`.
    pub fn bitmap_block(&self, b: u32) -> u32 {
        self.bmapstart + b / BPB
    }

    /// The total block count the layout fields imply (`bmapstart +
    /// bitmap_blocks + nblocks`), used to detect an oversize image.
    pub fn expected_size(&self) -> u32 {
        self.bmapstart + self.bitmap_blocks() + self.nblocks
    }

    /// Validate internal consistency of the superblock's layout (used by
    /// both `fill_super` and the image checker). Returns the list of
    /// mismatches found (empty = consistent) rather than failing outright,
    /// since the checker wants to report every discrepancy it can find.
    pub fn layout_mismatches(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let expected_logstart = 1u32;
        if self.logstart != expected_logstart {
            issues.push(format!(
                "expected logstart = {expected_logstart}, got {}",
                self.logstart
            ));
        }
        let expected_inodestart = expected_logstart + self.nlog;
        if self.inodestart != expected_inodestart {
            issues.push(format!(
                "expected inodestart = {expected_inodestart}, got {}",
                self.inodestart
            ));
        }
        let expected_bmapstart = expected_inodestart + self.inode_blocks();
        if self.bmapstart != expected_bmapstart {
            issues.push(format!(
                "expected bmapstart = {expected_bmapstart}, got {}",
                self.bmapstart
            ));
        }
        let expected_size = expected_bmapstart + self.bitmap_blocks() + self.nblocks;
        if self.size < expected_size {
            issues.push(format!(
                "disk too small ({} blocks), should be at least {}",
                self.size, expected_size
            ));
        }
        issues
    }
}

//! On-disk inode (`dinode`) and directory entry (`dirent`) records.

use crate::error::{FsError, FsResult};
use crate::layout::{DINODE_SIZE, DIRENT_SIZE, DIRSIZ, NDIRECT};

/// The `type` field of a [`DiskInode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    Free,
    Dir,
    File,
    Device,
}

impl InodeType {
    fn from_u16(v: u16) -> FsResult<Self> {
        Ok(match v {
            0 => InodeType::Free,
            1 => InodeType::Dir,
            2 => InodeType::File,
            3 => InodeType::Device,
            other => return Err(FsError::Invalid(format!("unsupported inode type {other}"))),
        })
    }

    fn to_u16(self) -> u16 {
        match self {
            InodeType::Free => 0,
            InodeType::Dir => 1,
            InodeType::File => 2,
            InodeType::Device => 3,
        }
    }
}

/// The on-disk inode record, decoded to CPU endianness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskInode {
    pub itype: InodeType,
    pub major: u16,
    pub minor: u16,
    pub nlink: u16,
    pub size: u32,
    pub addrs: [u32; NDIRECT + 1],
}

impl DiskInode {
    pub const ZERO: DiskInode = DiskInode {
        itype: InodeType::Free,
        major: 0,
        minor: 0,
        nlink: 0,
        size: 0,
        addrs: [0; NDIRECT + 1],
    };

    pub fn decode(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < DINODE_SIZE {
            return Err(FsError::Invalid("dinode buffer too short".into()));
        }
        let u16_at = |o: usize| u16::from_le_bytes(buf[o..o + 2].try_into().unwrap());
        let itype = InodeType::from_u16(u16_at(0))?;
        let major = u16_at(2);
        let minor = u16_at(4);
        let nlink = u16_at(6);
        let size = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let mut addrs = [0u32; NDIRECT + 1];
        for (i, slot) in addrs.iter_mut().enumerate() {
            let o = 12 + i * 4;
            *slot = u32::from_le_bytes(buf[o..o + 4].try_into().unwrap());
        }
        Ok(DiskInode {
            itype,
            major,
            minor,
            nlink,
            size,
            addrs,
        })
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&self.itype.to_u16().to_le_bytes());
        buf[2..4].copy_from_slice(&self.major.to_le_bytes());
        buf[4..6].copy_from_slice(&self.minor.to_le_bytes());
        buf[6..8].copy_from_slice(&self.nlink.to_le_bytes());
        buf[8..12].copy_from_slice(&self.size.to_le_bytes());
        for (i, addr) in self.addrs.iter().enumerate() {
            let o = 12 + i * 4;
            buf[o..o + 4].copy_from_slice(&addr.to_le_bytes());
        }
    }
}

/// A single directory entry: a 16-bit inode number plus a 14-byte,
/// NUL-padded (not NUL-terminated when full) name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dirent {
    pub inum: u16,
    pub name: [u8; DIRSIZ],
}

impl Dirent {
    pub const EMPTY: Dirent = Dirent {
        inum: 0,
        name: [0; DIRSIZ],
    };

    pub fn decode(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < DIRENT_SIZE {
            return Err(FsError::Invalid("dirent buffer too short".into()));
        }
        let inum = u16::from_le_bytes(buf[0..2].try_into().unwrap());
        let mut name = [0u8; DIRSIZ];
        name.copy_from_slice(&buf[2..2 + DIRSIZ]);
        Ok(Dirent { inum, name })
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&self.inum.to_le_bytes());
        buf[2..2 + DIRSIZ].copy_from_slice(&self.name);
    }

    pub fn new(inum: u16, name: &str) -> Self {
        let mut buf = [0u8; DIRSIZ];
        let bytes = name.as_bytes();
        let n = bytes.len().min(DIRSIZ);
        buf[..n].copy_from_slice(&bytes[..n]);
        Dirent { inum, name: buf }
    }

    /// `true` if this entry's name equals `target`, using the reference
    /// driver's exact comparison rule: byte-by-byte over the full `DIRSIZ`
    /// window, stopping at the first NUL found in *either* operand (so a
    /// name that's an accidental byte-prefix of another can never match).
    pub fn name_matches(&self, target: &str) -> bool {
        let target = target.as_bytes();
        for i in 0..DIRSIZ {
            let a = self.name[i];
            let b = target.get(i).copied().unwrap_or(0);
            if a != b || a == 0 {
                return a == 0 && b == 0;
            }
        }
        true
    }

    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(DIRSIZ);
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dinode_roundtrip() {
        let di = DiskInode {
            itype: InodeType::Dir,
            major: 0,
            minor: 0,
            nlink: 2,
            size: 32,
            addrs: {
                let mut a = [0u32; NDIRECT + 1];
                a[0] = 45;
                a
            },
        };
        let mut buf = [0u8; DINODE_SIZE];
        di.encode(&mut buf);
        assert_eq!(DiskInode::decode(&buf).unwrap(), di);
    }

    #[test]
    fn dirent_roundtrip() {
        let de = Dirent::new(7, "hello");
        let mut buf = [0u8; DIRENT_SIZE];
        de.encode(&mut buf);
        assert_eq!(Dirent::decode(&buf).unwrap(), de);
        assert_eq!(de.name_str(), "hello");
    }

    #[test]
    fn name_matches_respects_embedded_nul() {
        let de = Dirent::new(1, "ab");
        assert!(de.name_matches("ab"));
        assert!(!de.name_matches("abc"));
        assert!(!de.name_matches("a"));
    }

    #[test]
    fn name_matches_full_length_name_has_no_nul() {
        let de = Dirent::new(1, "fourteen_chars");
        assert_eq!(de.name.len(), DIRSIZ);
        assert!(de.name_matches("fourteen_chars"));
    }
}

//! Error kinds shared across the engine (spec §7).

use thiserror::Error;

/// Result alias used throughout the crate.
pub type FsResult<T> = Result<T, FsError>;

/// Uniform error taxonomy for the filesystem engine.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("I/O error reading or flushing block {block}")]
    Io { block: u32 },

    #[error("no free data blocks or inodes available")]
    NoSpace,

    #[error("inode {inum} is not a directory")]
    NotDir { inum: u32 },

    #[error("directory {inum} is not empty")]
    NotEmpty { inum: u32 },

    #[error("name {name:?} not found")]
    NotFound { name: String },

    #[error("name {name:?} already exists")]
    Exists { name: String },

    #[error("name {name:?} exceeds {max} bytes", max = crate::layout::DIRSIZ)]
    NameTooLong { name: String },

    #[error("logical block index {index} is beyond the maximum file size")]
    FileTooBig { index: u32 },

    #[error("mutation attempted on a read-only mount")]
    ReadOnly,

    #[error("user-memory copy faulted")]
    Fault,

    #[error("malformed on-disk structure: {0}")]
    Invalid(String),

    #[error("cannot unlink the root directory or \".\"")]
    Busy,

    #[error("link count on inode {inum} would overflow")]
    TooManyLinks { inum: u32 },
}

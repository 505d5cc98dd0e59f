//! On-disk structures and block-level algorithms of a small xv6-style
//! filesystem: a bitmap-backed block allocator, a direct/single-indirect
//! inode block map, a polymorphic directory iterator, a reference-counted
//! inode cache, and the file/directory operations built on top of them,
//! plus an offline image checker and an image formatter that share the
//! same primitives as the online engine through the [`device::BlockDevice`]
//! abstraction.
//!
//! The host integration layer (VFS-style dispatch, dentry caching, name
//! hashing, user-memory copy, process-wide module init/teardown) is out of
//! scope; this crate owns the engine, not the kernel plumbing around it.

pub mod alloc;
pub mod blockmap;
pub mod checker;
pub mod device;
pub mod dinode;
pub mod dir_ops;
pub mod diriter;
pub mod error;
pub mod file_ops;
pub mod format;
pub mod fs;
pub mod itable;
pub mod layout;
pub mod mem_device;

pub use device::{BlockDevice, BlockHandle};
pub use dinode::{DiskInode, Dirent, InodeType};
pub use error::{FsError, FsResult};
pub use fs::{Filesystem, MountOptions};
pub use itable::Inode;
pub use layout::SuperBlock;

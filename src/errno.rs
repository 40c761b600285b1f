//! This module stores the errno utilities.
//!
//! Operations report failures with standard Unix errno values so the adapter
//! can hand them back to the kernel unchanged.

/// Type representing a Unix errno.
pub type Errno = i32;

/// Result of a filesystem operation, carrying an [`Errno`] on failure.
pub type EResult<T> = Result<T, Errno>;

/// Device or resource busy.
pub const EBUSY: Errno = libc::EBUSY;
/// File exists.
pub const EEXIST: Errno = libc::EEXIST;
/// Invalid argument.
pub const EINVAL: Errno = libc::EINVAL;
/// I/O error.
pub const EIO: Errno = libc::EIO;
/// Is a directory.
pub const EISDIR: Errno = libc::EISDIR;
/// Filename too long.
pub const ENAMETOOLONG: Errno = libc::ENAMETOOLONG;
/// No such file or directory.
pub const ENOENT: Errno = libc::ENOENT;
/// No space left on device.
pub const ENOSPC: Errno = libc::ENOSPC;
/// Not a directory.
pub const ENOTDIR: Errno = libc::ENOTDIR;
/// Directory not empty.
pub const ENOTEMPTY: Errno = libc::ENOTEMPTY;
/// Value too large to be stored in data type.
pub const EOVERFLOW: Errno = libc::EOVERFLOW;

//! Block-level access to the disk image backing the filesystem.
//!
//! The image is a single regular file divided into [`BLOCK_SIZE`] byte
//! blocks. The device is positional: every transfer names the physical block
//! it touches. No buffering is performed beyond the operating system's.

use std::fs::File;
use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::BLOCK_SIZE;
use crate::errno::EResult;
use crate::errno;
use crate::sb::TOTAL_BLOCKS;

/// The disk image, accessed as an array of fixed-size blocks.
#[derive(Debug)]
pub struct BlockDev {
	/// The backing file.
	file: File,
}

impl BlockDev {
	/// Opens the disk image at `path`, creating the file if it does not exist.
	pub fn open(path: &Path) -> EResult<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.open(path)
			.map_err(|_| errno::EIO)?;
		Ok(Self {
			file,
		})
	}

	/// Tells whether the backing file is empty, meaning it has never been formatted.
	pub fn is_empty(&self) -> EResult<bool> {
		let metadata = self.file.metadata().map_err(|_| errno::EIO)?;
		Ok(metadata.len() == 0)
	}

	/// Grows the backing file to its full extent of [`TOTAL_BLOCKS`] blocks.
	///
	/// Blocks that are never written afterwards read as zeros.
	pub fn reserve(&self) -> EResult<()> {
		self.file
			.set_len(TOTAL_BLOCKS as u64 * BLOCK_SIZE as u64)
			.map_err(|_| errno::EIO)
	}

	/// Reads the physical block `blk` into `buf`.
	///
	/// `buf` must be `BLOCK_SIZE` bytes long.
	///
	/// If the block is outside of the image's bounds, the function returns an error.
	pub fn read_blk(&self, blk: u32, buf: &mut [u8]) -> EResult<()> {
		debug_assert_eq!(buf.len(), BLOCK_SIZE);
		if blk >= TOTAL_BLOCKS {
			return Err(errno::EIO);
		}
		self.file
			.read_exact_at(buf, blk as u64 * BLOCK_SIZE as u64)
			.map_err(|_| errno::EIO)
	}

	/// Writes `buf` to the physical block `blk`.
	///
	/// `buf` must be `BLOCK_SIZE` bytes long.
	///
	/// If the block is outside of the image's bounds, the function returns an error.
	pub fn write_blk(&self, blk: u32, buf: &[u8]) -> EResult<()> {
		debug_assert_eq!(buf.len(), BLOCK_SIZE);
		if blk >= TOTAL_BLOCKS {
			return Err(errno::EIO);
		}
		self.file
			.write_all_at(buf, blk as u64 * BLOCK_SIZE as u64)
			.map_err(|_| errno::EIO)
	}

	/// Writes `data` at the beginning of the physical block `blk` and zeroes
	/// the remainder of the block.
	///
	/// `data` must not be longer than `BLOCK_SIZE` bytes.
	pub fn write_blk_padded(&self, blk: u32, data: &[u8]) -> EResult<()> {
		debug_assert!(data.len() <= BLOCK_SIZE);
		let mut buf = [0u8; BLOCK_SIZE];
		buf[..data.len()].copy_from_slice(data);
		self.write_blk(blk, &buf)
	}
}

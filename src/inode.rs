//! An inode represents a file in the filesystem.
//!
//! The access to an inode's data is divided into several parts, each
//! overflowing on the next when full:
//! - Direct block pointers: each inode has 12 of them
//! - Singly indirect block pointer: points to a block dedicated to storing a
//!   list of more blocks storing the inode's data
//! - Doubly indirect block pointer: points to a block storing pointers to
//!   singly indirect blocks
//! - Triply indirect block pointer: points to a block storing pointers to
//!   doubly indirect blocks
//!
//! Unassigned pointers hold the sentinel value [`INVALID_BLOCK`]; the ranges
//! they cover read as zeros.

use std::cmp::min;

use bytemuck::Pod;
use bytemuck::Zeroable;

use crate::BLOCK_SIZE;
use crate::FileType;
use crate::INODES_COUNT;
use crate::Stat;
use crate::dev::BlockDev;
use crate::errno::EResult;
use crate::errno;
use crate::freelist::FreeList;
use crate::sb::DATA_BLOCKS_COUNT;
use crate::sb::DATA_REGION_BLOCK;
use crate::sb::INODE_TABLE_BLOCK;

/// The maximum number of direct blocks for each inode.
pub const DIRECT_BLOCKS_COUNT: usize = 12;
/// The size of an inode record in bytes.
pub const INODE_SIZE: usize = 128;
/// The number of block ids stored in one indirect block.
pub const ENTRIES_PER_BLOCK: u32 = (BLOCK_SIZE / 4) as u32;

/// Sentinel block id meaning "no block assigned".
pub const INVALID_BLOCK: u32 = DATA_BLOCKS_COUNT;

/// The inode of the root directory.
pub const ROOT_INO: u32 = 0;

/// INode type: Directory
const INODE_TYPE_DIRECTORY: u32 = 0x4000;
/// INode type: Regular file
const INODE_TYPE_REGULAR: u32 = 0x8000;

/// An inode represents a file in the filesystem. The name of the file is not
/// included in the inode but in the directory entry associated with it.
///
/// All fields are little-endian on disk; [`Inode::read`] and [`Inode::write`]
/// perform the conversion.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Inode {
	/// The inode's id.
	pub ino: u32,
	/// Type and permissions.
	pub mode: u32,
	/// The number of hard links to this inode.
	pub nlink: u32,
	/// The size of the file's content in bytes.
	pub size: u32,
	/// The number of data blocks assigned to the file, leaf blocks only.
	pub nblocks: u32,
	/// Timestamp of the last access.
	pub atime: u32,
	/// Timestamp of the last modification of the content.
	pub mtime: u32,
	/// Timestamp of the last modification of the metadata.
	pub ctime: u32,
	/// Block pointers: `DIRECT_BLOCKS_COUNT` direct slots, then the singly,
	/// doubly and triply indirect blocks.
	pub blocks: [u32; DIRECT_BLOCKS_COUNT + 3],
	/// Structure padding up to `INODE_SIZE`.
	_padding: [u8; INODE_SIZE - 92],
}

const _: () = assert!(std::mem::size_of::<Inode>() == INODE_SIZE);

/// Returns the physical block holding inode `ino` and the offset of the
/// record within that block.
fn disk_location(ino: u32) -> (u32, usize) {
	let per_blk = (BLOCK_SIZE / INODE_SIZE) as u32;
	let blk = INODE_TABLE_BLOCK + ino / per_blk;
	let off = (ino % per_blk) as usize * INODE_SIZE;
	(blk, off)
}

/// Computes the indirection offsets leading to the file block at linear
/// offset `off`.
///
/// `offsets[0]` is the index in the inode's `blocks` array; the following
/// entries are indexes within each level of indirect block.
///
/// On success, the function returns the number of offsets.
///
/// If the offset is beyond the triple-indirection reach, the function
/// returns [`errno::EOVERFLOW`].
fn indirection_offsets(mut off: u32, offsets: &mut [usize; 4]) -> EResult<usize> {
	offsets.fill(0);
	if off < DIRECT_BLOCKS_COUNT as u32 {
		offsets[0] = off as usize;
		return Ok(1);
	}
	off -= DIRECT_BLOCKS_COUNT as u32;
	let ent = ENTRIES_PER_BLOCK;
	if off < ent {
		offsets[0] = DIRECT_BLOCKS_COUNT;
		offsets[1] = off as usize;
		return Ok(2);
	}
	off -= ent;
	if off < ent * ent {
		offsets[0] = DIRECT_BLOCKS_COUNT + 1;
		offsets[1] = (off / ent) as usize;
		offsets[2] = (off % ent) as usize;
		return Ok(3);
	}
	off -= ent * ent;
	if off < ent * ent * ent {
		offsets[0] = DIRECT_BLOCKS_COUNT + 2;
		offsets[1] = (off / (ent * ent)) as usize;
		offsets[2] = (off / ent % ent) as usize;
		offsets[3] = (off % ent) as usize;
		return Ok(4);
	}
	Err(errno::EOVERFLOW)
}

/// Turns an on-disk block id into an `Option`, mapping the sentinel to `None`.
fn blk_to_option(blk: u32) -> Option<u32> {
	(blk != INVALID_BLOCK).then_some(blk)
}

/// Reads entry `i` of the indirect block `blk`.
fn read_indirect_entry(dev: &BlockDev, blk: u32, i: usize) -> EResult<u32> {
	let mut buf = [0u8; BLOCK_SIZE];
	dev.read_blk(DATA_REGION_BLOCK + blk, &mut buf)?;
	let off = i * 4;
	Ok(u32::from_le_bytes([
		buf[off],
		buf[off + 1],
		buf[off + 2],
		buf[off + 3],
	]))
}

/// Writes `val` to entry `i` of the indirect block `blk`.
fn write_indirect_entry(dev: &BlockDev, blk: u32, i: usize, val: u32) -> EResult<()> {
	let mut buf = [0u8; BLOCK_SIZE];
	dev.read_blk(DATA_REGION_BLOCK + blk, &mut buf)?;
	let off = i * 4;
	buf[off..off + 4].copy_from_slice(&val.to_le_bytes());
	dev.write_blk(DATA_REGION_BLOCK + blk, &buf)
}

/// Initializes a freshly assigned indirect block with every entry unassigned.
fn init_indirect_blk(dev: &BlockDev, blk: u32) -> EResult<()> {
	let mut buf = [0u8; BLOCK_SIZE];
	for ent in buf.chunks_exact_mut(4) {
		ent.copy_from_slice(&INVALID_BLOCK.to_le_bytes());
	}
	dev.write_blk(DATA_REGION_BLOCK + blk, &buf)
}

/// Writes zeros over the data block `blk`.
pub fn zero_blk(dev: &BlockDev, blk: u32) -> EResult<()> {
	dev.write_blk(DATA_REGION_BLOCK + blk, &[0u8; BLOCK_SIZE])
}

/// Releases every block of the indirect tree rooted at `blk`, the root
/// included. Leaves are released before the indirect block referencing them.
///
/// `level` is the number of indirections below `blk`.
fn free_indirect(dev: &BlockDev, free: &mut FreeList, blk: u32, level: usize) -> EResult<()> {
	let mut buf = [0u8; BLOCK_SIZE];
	dev.read_blk(DATA_REGION_BLOCK + blk, &mut buf)?;
	for ent in buf.chunks_exact(4) {
		let ent = u32::from_le_bytes([ent[0], ent[1], ent[2], ent[3]]);
		if ent == INVALID_BLOCK {
			continue;
		}
		if level > 1 {
			free_indirect(dev, free, ent, level - 1)?;
		} else {
			free.release(dev, ent)?;
		}
	}
	free.release(dev, blk)
}

impl Inode {
	/// Initializes the record of a freshly created inode.
	///
	/// Arguments:
	/// - `ino` is the inode's id.
	/// - `file_type` is the type of the file.
	/// - `first_blk` is the initial data block; every other slot starts
	///   unassigned.
	/// - `ts` is the creation timestamp.
	pub fn new(ino: u32, file_type: FileType, first_blk: u32, ts: u32) -> Self {
		let (mode, nlink) = match file_type {
			FileType::Regular => (INODE_TYPE_REGULAR, 1),
			FileType::Directory => (INODE_TYPE_DIRECTORY, 2),
		};
		let mut blocks = [INVALID_BLOCK; DIRECT_BLOCKS_COUNT + 3];
		blocks[0] = first_blk;
		Self {
			ino,
			mode,
			nlink,
			size: 0,
			nblocks: 1,
			atime: ts,
			mtime: ts,
			ctime: ts,
			blocks,
			_padding: [0; INODE_SIZE - 92],
		}
	}

	/// Converts every field between host and little-endian order.
	fn swap_le(mut self) -> Self {
		self.ino = self.ino.to_le();
		self.mode = self.mode.to_le();
		self.nlink = self.nlink.to_le();
		self.size = self.size.to_le();
		self.nblocks = self.nblocks.to_le();
		self.atime = self.atime.to_le();
		self.mtime = self.mtime.to_le();
		self.ctime = self.ctime.to_le();
		for blk in &mut self.blocks {
			*blk = blk.to_le();
		}
		self
	}

	/// Reads the inode `ino` from the inode table.
	pub fn read(ino: u32, dev: &BlockDev) -> EResult<Self> {
		if ino >= INODES_COUNT {
			return Err(errno::EINVAL);
		}
		let (blk, off) = disk_location(ino);
		let mut buf = [0u8; BLOCK_SIZE];
		dev.read_blk(blk, &mut buf)?;
		let inode: Inode = bytemuck::pod_read_unaligned(&buf[off..off + INODE_SIZE]);
		Ok(inode.swap_le())
	}

	/// Writes the inode back to the inode table.
	///
	/// The containing block is read first so the sibling inodes stored in the
	/// same block are preserved.
	pub fn write(&self, dev: &BlockDev) -> EResult<()> {
		let (blk, off) = disk_location(self.ino);
		let mut buf = [0u8; BLOCK_SIZE];
		dev.read_blk(blk, &mut buf)?;
		let raw = self.swap_le();
		buf[off..off + INODE_SIZE].copy_from_slice(bytemuck::bytes_of(&raw));
		dev.write_blk(blk, &buf)
	}

	/// Returns the type of the file.
	pub fn file_type(&self) -> FileType {
		match self.mode & 0xf000 {
			INODE_TYPE_DIRECTORY => FileType::Directory,
			_ => FileType::Regular,
		}
	}

	/// Returns the file's status.
	pub fn stat(&self) -> Stat {
		Stat {
			ino: self.ino,
			file_type: self.file_type(),
			nlink: self.nlink,
			size: self.size,
			blocks: self.nblocks,
			atime: self.atime,
			mtime: self.mtime,
			ctime: self.ctime,
		}
	}

	/// Returns the data block holding the file block at linear offset `off`.
	///
	/// If no block is assigned, the function returns `None` and the caller
	/// must treat the corresponding range as holding zeros.
	pub fn translate_blk(&self, off: u32, dev: &BlockDev) -> EResult<Option<u32>> {
		let mut offsets = [0usize; 4];
		let depth = indirection_offsets(off, &mut offsets)?;
		let mut blk = self.blocks[offsets[0]];
		for off in &offsets[1..depth] {
			if blk == INVALID_BLOCK {
				return Ok(None);
			}
			blk = read_indirect_entry(dev, blk, *off)?;
		}
		Ok(blk_to_option(blk))
	}

	/// Returns the data block holding the file block at linear offset `off`,
	/// assigning it and any missing indirect level on demand.
	///
	/// A freshly assigned block is initialized and persisted before anything
	/// on disk points at it: the leaf comes first, then each missing indirect
	/// level bottom-up. The inode record itself is only modified in memory
	/// and must be written back by the caller.
	pub fn alloc_blk(&mut self, off: u32, dev: &BlockDev, free: &mut FreeList) -> EResult<u32> {
		let mut offsets = [0usize; 4];
		let depth = indirection_offsets(off, &mut offsets)?;
		// Walk the existing chain down to the first missing level
		let mut chain = [INVALID_BLOCK; 4];
		chain[0] = self.blocks[offsets[0]];
		let mut missing = depth;
		if chain[0] == INVALID_BLOCK {
			missing = 0;
		} else {
			for lvl in 1..depth {
				let ent = read_indirect_entry(dev, chain[lvl - 1], offsets[lvl])?;
				if ent == INVALID_BLOCK {
					missing = lvl;
					break;
				}
				chain[lvl] = ent;
			}
		}
		if missing == depth {
			return Ok(chain[depth - 1]);
		}
		// Assign the leaf first so no reference can point at an
		// uninitialized block
		let leaf = free.alloc(dev)?;
		zero_blk(dev, leaf)?;
		self.nblocks += 1;
		// Build the missing indirect levels bottom-up
		let mut child = leaf;
		let mut lvl = depth - 1;
		while lvl > missing {
			let ind = free.alloc(dev)?;
			init_indirect_blk(dev, ind)?;
			write_indirect_entry(dev, ind, offsets[lvl], child)?;
			child = ind;
			lvl -= 1;
		}
		// Hook the new chain into the tree
		if missing == 0 {
			self.blocks[offsets[0]] = child;
		} else {
			write_indirect_entry(dev, chain[missing - 1], offsets[missing], child)?;
		}
		Ok(leaf)
	}

	/// Releases every data block reachable from the inode, indirect blocks
	/// included. The walk is post-order: leaves are released before the
	/// indirect blocks referencing them.
	///
	/// The inode record itself is only modified in memory.
	pub fn free_content(&mut self, dev: &BlockDev, free: &mut FreeList) -> EResult<()> {
		for i in 0..DIRECT_BLOCKS_COUNT {
			if let Some(blk) = blk_to_option(self.blocks[i]) {
				free.release(dev, blk)?;
			}
		}
		for level in 1..=3 {
			let slot = DIRECT_BLOCKS_COUNT + level - 1;
			if let Some(blk) = blk_to_option(self.blocks[slot]) {
				free_indirect(dev, free, blk, level)?;
			}
		}
		self.blocks.fill(INVALID_BLOCK);
		self.nblocks = 0;
		self.size = 0;
		Ok(())
	}

	/// Reads the file's content at offset `off` into `buf`.
	///
	/// Unassigned blocks in the requested range read as zeros.
	///
	/// The function returns the number of bytes read, `0` when `off` is at or
	/// past the end of the file.
	pub fn read_content(&self, off: u32, buf: &mut [u8], dev: &BlockDev) -> EResult<usize> {
		if off >= self.size {
			return Ok(0);
		}
		let max = min(buf.len(), (self.size - off) as usize);
		let mut blk_buf = [0u8; BLOCK_SIZE];
		let mut i = 0;
		while i < max {
			let pos = off + i as u32;
			let blk_off = pos / BLOCK_SIZE as u32;
			let inner = (pos % BLOCK_SIZE as u32) as usize;
			let len = min(max - i, BLOCK_SIZE - inner);
			match self.translate_blk(blk_off, dev)? {
				Some(blk) => {
					dev.read_blk(DATA_REGION_BLOCK + blk, &mut blk_buf)?;
					buf[i..i + len].copy_from_slice(&blk_buf[inner..inner + len]);
				}
				None => buf[i..i + len].fill(0),
			}
			i += len;
		}
		Ok(i)
	}

	/// Writes `buf` to the file's content at offset `off`.
	///
	/// Missing data blocks and indirect levels are assigned on demand; a
	/// write entirely past the current end of the file creates a sparse
	/// region reading as zeros. Partial blocks are read-modified-written.
	///
	/// The inode record (size and timestamps) is only modified in memory and
	/// must be written back by the caller.
	///
	/// On success, the function returns the number of bytes written.
	pub fn write_content(
		&mut self,
		off: u32,
		buf: &[u8],
		dev: &BlockDev,
		free: &mut FreeList,
	) -> EResult<usize> {
		if buf.is_empty() {
			return Ok(0);
		}
		let mut blk_buf = [0u8; BLOCK_SIZE];
		let mut i = 0;
		while i < buf.len() {
			let pos = off as u64 + i as u64;
			let blk_off = (pos / BLOCK_SIZE as u64) as u32;
			let inner = (pos % BLOCK_SIZE as u64) as usize;
			let len = min(buf.len() - i, BLOCK_SIZE - inner);
			let blk = self.alloc_blk(blk_off, dev, free)?;
			if len == BLOCK_SIZE {
				dev.write_blk(DATA_REGION_BLOCK + blk, &buf[i..i + len])?;
			} else {
				dev.read_blk(DATA_REGION_BLOCK + blk, &mut blk_buf)?;
				blk_buf[inner..inner + len].copy_from_slice(&buf[i..i + len]);
				dev.write_blk(DATA_REGION_BLOCK + blk, &blk_buf)?;
			}
			i += len;
		}
		let end = (off as u64 + buf.len() as u64) as u32;
		if end > self.size {
			self.size = end;
		}
		self.mtime = crate::timestamp();
		self.ctime = self.mtime;
		Ok(i)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	const E: u32 = ENTRIES_PER_BLOCK;
	const D: u32 = DIRECT_BLOCKS_COUNT as u32;

	fn offsets(off: u32) -> (usize, [usize; 4]) {
		let mut offsets = [0usize; 4];
		let depth = indirection_offsets(off, &mut offsets).unwrap();
		(depth, offsets)
	}

	#[test]
	fn offsets_direct() {
		assert_eq!(offsets(0), (1, [0, 0, 0, 0]));
		assert_eq!(offsets(11), (1, [11, 0, 0, 0]));
	}

	#[test]
	fn offsets_indirect() {
		assert_eq!(offsets(D), (2, [12, 0, 0, 0]));
		assert_eq!(offsets(D + E - 1), (2, [12, 127, 0, 0]));
	}

	#[test]
	fn offsets_double_indirect() {
		assert_eq!(offsets(D + E), (3, [13, 0, 0, 0]));
		assert_eq!(offsets(D + E + E + 1), (3, [13, 1, 1, 0]));
		assert_eq!(offsets(D + E + E * E - 1), (3, [13, 127, 127, 0]));
	}

	#[test]
	fn offsets_triple_indirect() {
		assert_eq!(offsets(D + E + E * E), (4, [14, 0, 0, 0]));
		assert_eq!(
			offsets(D + E + E * E + E * E * E - 1),
			(4, [14, 127, 127, 127])
		);
	}

	#[test]
	fn offsets_overflow() {
		let mut buf = [0usize; 4];
		let res = indirection_offsets(D + E + E * E + E * E * E, &mut buf);
		assert_eq!(res, Err(errno::EOVERFLOW));
	}

	#[test]
	fn inode_disk_location() {
		assert_eq!(disk_location(0), (INODE_TABLE_BLOCK, 0));
		assert_eq!(disk_location(3), (INODE_TABLE_BLOCK, 384));
		assert_eq!(disk_location(4), (INODE_TABLE_BLOCK + 1, 0));
		assert_eq!(disk_location(255), (INODE_TABLE_BLOCK + 63, 384));
	}
}

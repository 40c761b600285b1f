//! The superblock identifies the filesystem and anchors its on-disk layout.
//!
//! The image is laid out as follows:
//! - Block 0: the superblock
//! - Block 1: the inode bitmap
//! - Blocks 2..1026: the data block bitmap
//! - Blocks 1026..1090: the inode table
//! - Blocks 1090..: the data region
//!
//! Both bitmaps are packed bit arrays with one entry per inode or data block.
//! A set bit means the entry is used, a clear bit means it is free.

use bytemuck::Pod;
use bytemuck::Zeroable;
use log::info;

use crate::BLOCK_SIZE;
use crate::INODES_COUNT;
use crate::dev::BlockDev;
use crate::errno::EResult;
use crate::inode::ENTRIES_PER_BLOCK;
use crate::inode::INODE_SIZE;
use crate::inode::Inode;
use crate::inode::ROOT_INO;
use crate::timestamp;

/// The filesystem's signature, `imfs` in ASCII.
pub const SUPERBLOCK_MAGIC: u32 = 0x696d6673;

/// The total number of data blocks, sized to cover the double-indirection
/// reach of every inode.
pub const DATA_BLOCKS_COUNT: u32 = INODES_COUNT * ENTRIES_PER_BLOCK * ENTRIES_PER_BLOCK;

/// The block containing the superblock.
const SUPERBLOCK_BLOCK: u32 = 0;
/// The first block of the inode bitmap.
pub const INODE_BITMAP_BLOCK: u32 = SUPERBLOCK_BLOCK + 1;
/// The number of blocks of the inode bitmap.
const INODE_BITMAP_BLOCKS: u32 = 1;
/// The first block of the data block bitmap.
pub const DATA_BITMAP_BLOCK: u32 = INODE_BITMAP_BLOCK + INODE_BITMAP_BLOCKS;
/// The number of blocks of the data block bitmap.
const DATA_BITMAP_BLOCKS: u32 = DATA_BLOCKS_COUNT / (BLOCK_SIZE as u32 * 8);
/// The first block of the inode table.
pub const INODE_TABLE_BLOCK: u32 = DATA_BITMAP_BLOCK + DATA_BITMAP_BLOCKS;
/// The number of blocks of the inode table.
const INODE_TABLE_BLOCKS: u32 = INODES_COUNT / (BLOCK_SIZE / INODE_SIZE) as u32;
/// The first block of the data region. Data block ids are relative to it.
pub const DATA_REGION_BLOCK: u32 = INODE_TABLE_BLOCK + INODE_TABLE_BLOCKS;
/// The total number of blocks in the image.
pub const TOTAL_BLOCKS: u32 = DATA_REGION_BLOCK + DATA_BLOCKS_COUNT;

/// The superblock structure, stored at the beginning of the first block of
/// the image. The rest of the block is zero-padded.
///
/// All fields are little-endian on disk; [`Superblock::read`] and
/// [`Superblock::write`] perform the conversion.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Superblock {
	/// The filesystem's signature.
	magic: u32,
	/// Total number of data blocks.
	pub total_data_blocks: u32,
	/// Number of free data blocks.
	pub free_data_blocks: u32,
	/// Total number of inodes.
	pub total_inodes: u32,
	/// The first block of the inode bitmap.
	pub inode_bitmap_block: u32,
	/// The first block of the data block bitmap.
	pub data_bitmap_block: u32,
	/// The inode of the root directory.
	pub root_ino: u32,
}

const _: () = assert!(std::mem::size_of::<Superblock>() <= BLOCK_SIZE);

impl Superblock {
	/// Builds the superblock of a freshly formatted filesystem.
	fn new() -> Self {
		Self {
			magic: SUPERBLOCK_MAGIC,
			total_data_blocks: DATA_BLOCKS_COUNT,
			// The root directory occupies the first data block
			free_data_blocks: DATA_BLOCKS_COUNT - 1,
			total_inodes: INODES_COUNT,
			inode_bitmap_block: INODE_BITMAP_BLOCK,
			data_bitmap_block: DATA_BITMAP_BLOCK,
			root_ino: ROOT_INO,
		}
	}

	/// Converts every field between host and little-endian order.
	fn swap_le(mut self) -> Self {
		self.magic = self.magic.to_le();
		self.total_data_blocks = self.total_data_blocks.to_le();
		self.free_data_blocks = self.free_data_blocks.to_le();
		self.total_inodes = self.total_inodes.to_le();
		self.inode_bitmap_block = self.inode_bitmap_block.to_le();
		self.data_bitmap_block = self.data_bitmap_block.to_le();
		self.root_ino = self.root_ino.to_le();
		self
	}

	/// Reads the superblock from the given device.
	pub fn read(dev: &BlockDev) -> EResult<Self> {
		let mut buf = [0u8; BLOCK_SIZE];
		dev.read_blk(SUPERBLOCK_BLOCK, &mut buf)?;
		let sb: Superblock =
			bytemuck::pod_read_unaligned(&buf[..std::mem::size_of::<Superblock>()]);
		Ok(sb.swap_le())
	}

	/// Writes the superblock to the given device.
	pub fn write(&self, dev: &BlockDev) -> EResult<()> {
		let raw = self.swap_le();
		dev.write_blk_padded(SUPERBLOCK_BLOCK, bytemuck::bytes_of(&raw))
	}

	/// Tells whether the superblock is valid.
	pub fn is_valid(&self) -> bool {
		self.magic == SUPERBLOCK_MAGIC
	}
}

/// Returns the state of entry `i` of the bitmap starting at block `start`.
pub fn bitmap_get(dev: &BlockDev, start: u32, i: u32) -> EResult<bool> {
	let mut buf = [0u8; BLOCK_SIZE];
	let blk = start + i / (BLOCK_SIZE as u32 * 8);
	dev.read_blk(blk, &mut buf)?;
	let byte = (i / 8) as usize % BLOCK_SIZE;
	let bit = i % 8;
	Ok(buf[byte] >> bit & 1 != 0)
}

/// Changes the state of entry `i` of the bitmap starting at block `start`.
///
/// `used` is the new state of the entry. The containing bitmap block is
/// persisted before the function returns.
pub fn bitmap_set(dev: &BlockDev, start: u32, i: u32, used: bool) -> EResult<()> {
	let mut buf = [0u8; BLOCK_SIZE];
	let blk = start + i / (BLOCK_SIZE as u32 * 8);
	dev.read_blk(blk, &mut buf)?;
	let byte = (i / 8) as usize % BLOCK_SIZE;
	let bit = i % 8;
	if used {
		buf[byte] |= 1 << bit;
	} else {
		buf[byte] &= !(1 << bit);
	}
	dev.write_blk(blk, &buf)
}

/// Formats the image on the given device.
///
/// The backing file is grown to its full extent, which zeroes both bitmaps
/// and the inode and data regions. The root directory's inode and first data
/// block are then marked used, the root inode record is written and the
/// superblock is written last.
pub fn format(dev: &BlockDev) -> EResult<()> {
	info!("formatting empty image: {TOTAL_BLOCKS} blocks of {BLOCK_SIZE} bytes");
	dev.reserve()?;
	bitmap_set(dev, INODE_BITMAP_BLOCK, ROOT_INO, true)?;
	bitmap_set(dev, DATA_BITMAP_BLOCK, 0, true)?;
	let root = Inode::new(ROOT_INO, crate::FileType::Directory, 0, timestamp());
	root.write(dev)?;
	Superblock::new().write(dev)
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn layout() {
		assert_eq!(INODE_BITMAP_BLOCK, 1);
		assert_eq!(DATA_BITMAP_BLOCK, 2);
		assert_eq!(INODE_TABLE_BLOCK, 1026);
		assert_eq!(DATA_REGION_BLOCK, 1090);
	}

	#[test]
	fn bitmap_roundtrip() {
		let dir = TempDir::new().unwrap();
		let dev = BlockDev::open(&dir.path().join("disk.img")).unwrap();
		dev.reserve().unwrap();

		for i in [0, 1, 7, 8, 511 * 8, BLOCK_SIZE as u32 * 8 + 3] {
			assert!(!bitmap_get(&dev, DATA_BITMAP_BLOCK, i).unwrap());
			bitmap_set(&dev, DATA_BITMAP_BLOCK, i, true).unwrap();
			assert!(bitmap_get(&dev, DATA_BITMAP_BLOCK, i).unwrap());
		}
		bitmap_set(&dev, DATA_BITMAP_BLOCK, 7, false).unwrap();
		assert!(!bitmap_get(&dev, DATA_BITMAP_BLOCK, 7).unwrap());
		// Neighbours are untouched
		assert!(bitmap_get(&dev, DATA_BITMAP_BLOCK, 8).unwrap());
	}

	#[test]
	fn format_superblock() {
		let dir = TempDir::new().unwrap();
		let dev = BlockDev::open(&dir.path().join("disk.img")).unwrap();
		format(&dev).unwrap();

		let sb = Superblock::read(&dev).unwrap();
		assert!(sb.is_valid());
		assert_eq!(sb.total_data_blocks, DATA_BLOCKS_COUNT);
		assert_eq!(sb.free_data_blocks, DATA_BLOCKS_COUNT - 1);
		assert_eq!(sb.root_ino, ROOT_INO);
		assert!(bitmap_get(&dev, INODE_BITMAP_BLOCK, ROOT_INO).unwrap());
		assert!(bitmap_get(&dev, DATA_BITMAP_BLOCK, 0).unwrap());
		assert!(!bitmap_get(&dev, DATA_BITMAP_BLOCK, 1).unwrap());
	}
}

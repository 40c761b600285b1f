//! In-memory caches of the free inode and data block ids.
//!
//! A cache mirrors one on-disk bitmap and is rebuilt from it at mount time.
//! Allocation is FIFO: ids are taken from the head of the list and released
//! ids rejoin at the tail, which keeps the allocation pattern deterministic.

use std::collections::VecDeque;

use crate::BLOCK_SIZE;
use crate::dev::BlockDev;
use crate::errno::EResult;
use crate::errno;
use crate::sb;

/// An ordered cache of free ids, kept coherent with an on-disk bitmap.
#[derive(Debug)]
pub struct FreeList {
	/// The first block of the mirrored bitmap.
	bitmap_start: u32,
	/// The free ids, in allocation order.
	ids: VecDeque<u32>,
}

impl FreeList {
	/// Rebuilds the cache by scanning the bitmap starting at block
	/// `bitmap_start` and holding `capacity` entries.
	pub fn rebuild(dev: &BlockDev, bitmap_start: u32, capacity: u32) -> EResult<Self> {
		let mut ids = VecDeque::new();
		let mut buf = [0u8; BLOCK_SIZE];
		let blocks = capacity.div_ceil(BLOCK_SIZE as u32 * 8);
		for b in 0..blocks {
			dev.read_blk(bitmap_start + b, &mut buf)?;
			let base = b * BLOCK_SIZE as u32 * 8;
			for (i, byte) in buf.iter().enumerate() {
				let id = base + i as u32 * 8;
				if id >= capacity {
					break;
				}
				if *byte == 0xff {
					continue;
				}
				for j in 0..8 {
					let id = id + j;
					if id >= capacity {
						break;
					}
					if *byte >> j & 1 == 0 {
						ids.push_back(id);
					}
				}
			}
		}
		Ok(Self {
			bitmap_start,
			ids,
		})
	}

	/// Returns the number of free ids.
	pub fn len(&self) -> usize {
		self.ids.len()
	}

	/// Tells whether no id is free.
	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	/// Takes the id at the head of the list, marking it used in the bitmap.
	///
	/// The bitmap is persisted before the cache is modified.
	///
	/// If no id is free, the function returns [`errno::ENOSPC`].
	pub fn alloc(&mut self, dev: &BlockDev) -> EResult<u32> {
		let id = self.ids.front().copied().ok_or(errno::ENOSPC)?;
		sb::bitmap_set(dev, self.bitmap_start, id, true)?;
		self.ids.pop_front();
		Ok(id)
	}

	/// Releases `id`, marking it free in the bitmap and appending it to the
	/// tail of the list.
	pub fn release(&mut self, dev: &BlockDev, id: u32) -> EResult<()> {
		sb::bitmap_set(dev, self.bitmap_start, id, false)?;
		self.ids.push_back(id);
		Ok(())
	}
}

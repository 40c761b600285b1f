//! A directory entry is an entry stored into a directory inode's content
//! which associates a name with an inode.
//!
//! A directory's content is a packed array of fixed-size entries; its size is
//! always a multiple of [`DENTRY_SIZE`].

use bytemuck::Pod;
use bytemuck::Zeroable;

use crate::dev::BlockDev;
use crate::errno::EResult;
use crate::errno;
use crate::freelist::FreeList;
use crate::inode::Inode;
use crate::timestamp;

/// The maximum length of a file name in bytes.
pub const NAME_MAX: usize = 32;
/// The size of a directory entry in bytes.
pub const DENTRY_SIZE: usize = 64;

/// A directory entry, pointing a name at an inode.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct Dentry {
	/// The inode the entry points to.
	pub ino: u32,
	/// The entry's name, NUL-padded to `NAME_MAX` bytes.
	name: [u8; NAME_MAX],
	/// Structure padding up to `DENTRY_SIZE`.
	_padding: [u8; DENTRY_SIZE - NAME_MAX - 4],
}

const _: () = assert!(std::mem::size_of::<Dentry>() == DENTRY_SIZE);

impl Dentry {
	/// Builds the entry associating `name` with the inode `ino`.
	///
	/// If the name does not fit in `NAME_MAX` bytes, the function returns
	/// [`errno::ENAMETOOLONG`].
	pub fn new(ino: u32, name: &[u8]) -> EResult<Self> {
		if name.len() > NAME_MAX {
			return Err(errno::ENAMETOOLONG);
		}
		let mut n = [0u8; NAME_MAX];
		n[..name.len()].copy_from_slice(name);
		Ok(Self {
			ino,
			name: n,
			_padding: [0; DENTRY_SIZE - NAME_MAX - 4],
		})
	}

	/// Returns the entry's name, without the NUL padding.
	pub fn name(&self) -> &[u8] {
		let len = self.name.iter().position(|b| *b == 0).unwrap_or(NAME_MAX);
		&self.name[..len]
	}

	/// Converts the record between host and little-endian order.
	fn swap_le(mut self) -> Self {
		self.ino = self.ino.to_le();
		self
	}
}

/// Reads every entry of the directory `dir`, in storage order.
pub fn read_entries(dir: &Inode, dev: &BlockDev) -> EResult<Vec<Dentry>> {
	debug_assert_eq!(dir.size as usize % DENTRY_SIZE, 0);
	let mut buf = vec![0u8; dir.size as usize];
	dir.read_content(0, &mut buf, dev)?;
	let entries = buf
		.chunks_exact(DENTRY_SIZE)
		.map(|chunk| bytemuck::pod_read_unaligned::<Dentry>(chunk).swap_le())
		.collect();
	Ok(entries)
}

/// Returns the inode pointed at by the entry named `name` in the directory
/// `dir`, or `None` if there is no such entry.
pub fn lookup(dir: &Inode, name: &[u8], dev: &BlockDev) -> EResult<Option<u32>> {
	let entries = read_entries(dir, dev)?;
	Ok(entries.iter().find(|ent| ent.name() == name).map(|ent| ent.ino))
}

/// Appends an entry associating `name` with the inode `ino` to the directory
/// `dir`.
///
/// The entry's uniqueness is the caller's responsibility, as is persisting
/// the directory's inode.
pub fn add(
	dir: &mut Inode,
	name: &[u8],
	ino: u32,
	dev: &BlockDev,
	free: &mut FreeList,
) -> EResult<()> {
	let ent = Dentry::new(ino, name)?.swap_le();
	let off = dir.size;
	dir.write_content(off, bytemuck::bytes_of(&ent), dev, free)?;
	Ok(())
}

/// Removes the entry named `name` from the directory `dir`, moving the tail
/// entry into the vacated slot.
///
/// Persisting the directory's inode is the caller's responsibility.
///
/// If there is no such entry, the function returns [`errno::ENOENT`].
pub fn remove(dir: &mut Inode, name: &[u8], dev: &BlockDev, free: &mut FreeList) -> EResult<()> {
	let entries = read_entries(dir, dev)?;
	let i = entries
		.iter()
		.position(|ent| ent.name() == name)
		.ok_or(errno::ENOENT)?;
	let last = entries.len() - 1;
	if i < last {
		let tail = entries[last].swap_le();
		dir.write_content((i * DENTRY_SIZE) as u32, bytemuck::bytes_of(&tail), dev, free)?;
	}
	dir.size -= DENTRY_SIZE as u32;
	dir.mtime = timestamp();
	dir.ctime = dir.mtime;
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn dentry_name() {
		let ent = Dentry::new(3, b"hello").unwrap();
		assert_eq!(ent.ino, 3);
		assert_eq!(ent.name(), b"hello");
	}

	#[test]
	fn dentry_name_full_length() {
		let name = [b'a'; NAME_MAX];
		let ent = Dentry::new(1, &name).unwrap();
		assert_eq!(ent.name(), name.as_slice());
	}

	#[test]
	fn dentry_name_too_long() {
		let name = [b'a'; NAME_MAX + 1];
		assert_eq!(Dentry::new(1, &name).unwrap_err(), errno::ENAMETOOLONG);
	}
}

//! A user-space filesystem persisting its whole namespace and file data in a
//! single backing file, the disk image, organized as an array of fixed-size
//! blocks.
//!
//! The image is divided into several substructures:
//! - Superblock: identifies the filesystem and locates the other regions
//! - Inode bitmap and data block bitmap: allocation state, one bit per entry
//! - Inode table: fixed-size inode records
//! - Data region: file content and indirect blocks
//!
//! File content is addressed through the classical direct/indirect block
//! pointer scheme (see the [`inode`] module). Free inode and data block ids
//! are cached in memory as FIFO lists (see the [`freelist`] module), rebuilt
//! from the bitmaps at mount time.
//!
//! The operations exposed by [`Imgfs`] are the upcalls of a kernel
//! filesystem adapter, which is expected to serialize them: nothing here is
//! internally synchronized, and every mutating operation takes `&mut self`.

pub mod dev;
pub mod dirent;
pub mod errno;
pub mod freelist;
pub mod inode;
pub mod path;
pub mod sb;

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use log::debug;
use log::info;

use crate::dev::BlockDev;
use crate::dirent::NAME_MAX;
use crate::errno::EResult;
use crate::freelist::FreeList;
use crate::inode::Inode;
use crate::path::Path;
use crate::sb::DATA_BLOCKS_COUNT;
use crate::sb::Superblock;

/// The size of a block in bytes.
pub const BLOCK_SIZE: usize = 512;
/// The maximum number of inodes on the filesystem.
pub const INODES_COUNT: u32 = 256;
/// Sentinel inode id meaning "no inode".
pub const INVALID_INO: u32 = INODES_COUNT;

/// Returns the current Unix timestamp in seconds.
pub(crate) fn timestamp() -> u32 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as u32)
		.unwrap_or(0)
}

/// The type of a file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
	/// A regular file.
	Regular,
	/// A directory.
	Directory,
}

/// Status information on a file, as reported by `getattr`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stat {
	/// The file's inode.
	pub ino: u32,
	/// The file's type.
	pub file_type: FileType,
	/// The number of hard links to the file.
	pub nlink: u32,
	/// The size of the file's content in bytes.
	pub size: u32,
	/// The number of data blocks assigned to the file.
	pub blocks: u32,
	/// Timestamp of the last access.
	pub atime: u32,
	/// Timestamp of the last modification of the content.
	pub mtime: u32,
	/// Timestamp of the last modification of the metadata.
	pub ctime: u32,
}

/// Statistics about the filesystem, as reported by `statfs`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Statfs {
	/// The size of a block in bytes.
	pub bsize: u32,
	/// The total number of data blocks.
	pub blocks: u32,
	/// The number of free data blocks.
	pub bfree: u32,
	/// The total number of inodes.
	pub files: u32,
	/// The number of free inodes.
	pub ffree: u32,
	/// The maximum length of file names.
	pub namelen: u32,
}

/// An entry reported by `readdir`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirEntry {
	/// The entry's name.
	pub name: Vec<u8>,
	/// The entry's inode.
	pub ino: u32,
}

/// An instance of the filesystem, bound to its disk image.
pub struct Imgfs {
	/// The block device backing the filesystem.
	dev: BlockDev,
	/// The filesystem's superblock.
	superblock: Superblock,
	/// Free inode ids, in allocation order.
	free_inodes: FreeList,
	/// Free data block ids, in allocation order.
	free_blocks: FreeList,
	/// The root directory's inode, cached from the superblock.
	root: u32,
}

impl Imgfs {
	/// Tells whether the file at `image` already contains a filesystem.
	pub fn detect(image: &std::path::Path) -> EResult<bool> {
		let dev = BlockDev::open(image)?;
		if dev.is_empty()? {
			return Ok(false);
		}
		Ok(Superblock::read(&dev)?.is_valid())
	}

	/// Mounts the filesystem inside the disk image at `image`, formatting it
	/// first if the backing file is empty.
	///
	/// The superblock is validated and both free-list caches are rebuilt from
	/// the on-disk bitmaps.
	pub fn mount(image: &std::path::Path) -> EResult<Self> {
		let dev = BlockDev::open(image)?;
		if dev.is_empty()? {
			sb::format(&dev)?;
		}
		let superblock = Superblock::read(&dev)?;
		if !superblock.is_valid() {
			return Err(errno::EINVAL);
		}
		let free_inodes = FreeList::rebuild(&dev, superblock.inode_bitmap_block, INODES_COUNT)?;
		let free_blocks = FreeList::rebuild(&dev, superblock.data_bitmap_block, DATA_BLOCKS_COUNT)?;
		info!(
			"mounted image: {} free inodes, {} free data blocks",
			free_inodes.len(),
			free_blocks.len()
		);
		Ok(Self {
			dev,
			superblock,
			free_inodes,
			free_blocks,
			root: superblock.root_ino,
		})
	}

	/// Writes the in-memory filesystem state back to the image.
	fn sync(&mut self) -> EResult<()> {
		self.superblock.free_data_blocks = self.free_blocks.len() as u32;
		self.superblock.write(&self.dev)
	}

	/// Unmounts the filesystem, writing back the superblock and dropping the
	/// free-list caches.
	///
	/// The bitmaps and the inode table are already persistent.
	pub fn unmount(mut self) -> EResult<()> {
		info!("unmounting image");
		self.sync()
	}

	/// Resolves the absolute path `path` and returns the corresponding inode.
	///
	/// Every intermediate component must be a directory.
	fn resolve(&self, path: &Path) -> EResult<u32> {
		if !path.is_absolute() {
			return Err(errno::EINVAL);
		}
		let mut ino = self.root;
		for name in path.components() {
			let cur = Inode::read(ino, &self.dev)?;
			if cur.file_type() != FileType::Directory {
				return Err(errno::ENOTDIR);
			}
			ino = dirent::lookup(&cur, name, &self.dev)?.ok_or(errno::ENOENT)?;
		}
		Ok(ino)
	}

	/// Resolves the parent directory of `path`.
	///
	/// The function returns the parent's inode along with the final component
	/// of `path`.
	fn resolve_parent<'p>(&self, path: &'p Path) -> EResult<(u32, &'p [u8])> {
		let name = path.file_name().ok_or(errno::EINVAL)?;
		let parent = path.parent().ok_or(errno::EINVAL)?;
		let ino = self.resolve(parent)?;
		Ok((ino, name))
	}

	/// Creates an inode of the given type at `path`.
	///
	/// On success, the function returns the new inode's id.
	fn create_inode(&mut self, path: &Path, file_type: FileType) -> EResult<u32> {
		let (parent_ino, name) = self.resolve_parent(path)?;
		if name.len() > NAME_MAX {
			return Err(errno::ENAMETOOLONG);
		}
		let mut parent = Inode::read(parent_ino, &self.dev)?;
		if parent.file_type() != FileType::Directory {
			return Err(errno::ENOTDIR);
		}
		if dirent::lookup(&parent, name, &self.dev)?.is_some() {
			return Err(errno::EEXIST);
		}
		let ino = self.free_inodes.alloc(&self.dev)?;
		let blk = self.free_blocks.alloc(&self.dev)?;
		// The block may have belonged to a removed file
		inode::zero_blk(&self.dev, blk)?;
		let node = Inode::new(ino, file_type, blk, timestamp());
		node.write(&self.dev)?;
		dirent::add(&mut parent, name, ino, &self.dev, &mut self.free_blocks)?;
		if file_type == FileType::Directory {
			parent.nlink += 1;
		}
		parent.write(&self.dev)?;
		Ok(ino)
	}

	/// Removes the inode at `path`: its directory entry, its block tree and
	/// the inode id itself are all released.
	fn remove_inode(&mut self, path: &Path, mut node: Inode) -> EResult<()> {
		let (parent_ino, name) = self.resolve_parent(path)?;
		let mut parent = Inode::read(parent_ino, &self.dev)?;
		dirent::remove(&mut parent, name, &self.dev, &mut self.free_blocks)?;
		if node.file_type() == FileType::Directory {
			parent.nlink -= 1;
		}
		parent.write(&self.dev)?;
		node.free_content(&self.dev, &mut self.free_blocks)?;
		self.free_inodes.release(&self.dev, node.ino)
	}

	/// Returns the status of the file at `path`.
	pub fn getattr(&self, path: &Path) -> EResult<Stat> {
		let ino = self.resolve(path)?;
		let node = Inode::read(ino, &self.dev)?;
		Ok(node.stat())
	}

	/// Creates a regular file at `path`.
	///
	/// On success, the function returns the new inode's id.
	pub fn create(&mut self, path: &Path) -> EResult<u32> {
		debug!("create: path={path}");
		self.create_inode(path, FileType::Regular)
	}

	/// Creates a directory at `path`.
	///
	/// On success, the function returns the new inode's id.
	pub fn mkdir(&mut self, path: &Path) -> EResult<u32> {
		debug!("mkdir: path={path}");
		self.create_inode(path, FileType::Directory)
	}

	/// Removes the regular file at `path`.
	pub fn unlink(&mut self, path: &Path) -> EResult<()> {
		debug!("unlink: path={path}");
		let ino = self.resolve(path)?;
		let node = Inode::read(ino, &self.dev)?;
		if node.file_type() == FileType::Directory {
			return Err(errno::EISDIR);
		}
		self.remove_inode(path, node)
	}

	/// Removes the directory at `path`.
	///
	/// If the directory is not empty, the function returns
	/// [`errno::ENOTEMPTY`].
	pub fn rmdir(&mut self, path: &Path) -> EResult<()> {
		debug!("rmdir: path={path}");
		let ino = self.resolve(path)?;
		if ino == self.root {
			return Err(errno::EBUSY);
		}
		let node = Inode::read(ino, &self.dev)?;
		if node.file_type() != FileType::Directory {
			return Err(errno::ENOTDIR);
		}
		if node.size > 0 {
			return Err(errno::ENOTEMPTY);
		}
		self.remove_inode(path, node)
	}

	/// Opens the regular file at `path`.
	///
	/// No per-open state is kept: the operation checks that the target exists
	/// and is a regular file.
	pub fn open(&self, path: &Path) -> EResult<()> {
		let ino = self.resolve(path)?;
		let node = Inode::read(ino, &self.dev)?;
		match node.file_type() {
			FileType::Regular => Ok(()),
			FileType::Directory => Err(errno::EISDIR),
		}
	}

	/// Opens the directory at `path`.
	///
	/// No per-open state is kept: the operation checks that the target exists
	/// and is a directory.
	pub fn opendir(&self, path: &Path) -> EResult<()> {
		let ino = self.resolve(path)?;
		let node = Inode::read(ino, &self.dev)?;
		match node.file_type() {
			FileType::Directory => Ok(()),
			FileType::Regular => Err(errno::ENOTDIR),
		}
	}

	/// Closes the directory at `path`.
	///
	/// Since no per-open state is kept, this is a no-op.
	pub fn releasedir(&self, _path: &Path) -> EResult<()> {
		Ok(())
	}

	/// Reads from the file at `path` into `buf`, starting at offset `off`.
	///
	/// On success, the function returns the number of bytes read. Reading at
	/// or past the end of the file returns `0`; sparse regions read as zeros.
	pub fn read(&mut self, path: &Path, buf: &mut [u8], off: u32) -> EResult<usize> {
		let ino = self.resolve(path)?;
		let mut node = Inode::read(ino, &self.dev)?;
		if node.file_type() == FileType::Directory {
			return Err(errno::EISDIR);
		}
		let len = node.read_content(off, buf, &self.dev)?;
		node.atime = timestamp();
		node.write(&self.dev)?;
		Ok(len)
	}

	/// Writes `buf` to the file at `path`, starting at offset `off`.
	///
	/// Data blocks are assigned on demand; writing past the end of the file
	/// extends it, leaving a sparse region after the previous end.
	///
	/// On success, the function returns the number of bytes written.
	pub fn write(&mut self, path: &Path, buf: &[u8], off: u32) -> EResult<usize> {
		let ino = self.resolve(path)?;
		let mut node = Inode::read(ino, &self.dev)?;
		if node.file_type() == FileType::Directory {
			return Err(errno::EISDIR);
		}
		let len = node.write_content(off, buf, &self.dev, &mut self.free_blocks)?;
		node.write(&self.dev)?;
		Ok(len)
	}

	/// Returns statistics about the filesystem.
	pub fn statfs(&self) -> Statfs {
		Statfs {
			bsize: BLOCK_SIZE as u32,
			blocks: self.superblock.total_data_blocks,
			bfree: self.free_blocks.len() as u32,
			files: self.superblock.total_inodes,
			ffree: self.free_inodes.len() as u32,
			namelen: NAME_MAX as u32,
		}
	}

	/// Lists the content of the directory at `path`.
	///
	/// The `.` and `..` entries come first, followed by every stored entry in
	/// directory order.
	pub fn readdir(&self, path: &Path) -> EResult<Vec<DirEntry>> {
		let ino = self.resolve(path)?;
		let node = Inode::read(ino, &self.dev)?;
		if node.file_type() != FileType::Directory {
			return Err(errno::ENOTDIR);
		}
		let parent = match path.parent() {
			Some(parent) => self.resolve(parent)?,
			// `..` on the root loops back to the root
			None => self.root,
		};
		let entries = dirent::read_entries(&node, &self.dev)?;
		let mut out = Vec::with_capacity(entries.len() + 2);
		out.push(DirEntry {
			name: b".".to_vec(),
			ino,
		});
		out.push(DirEntry {
			name: b"..".to_vec(),
			ino: parent,
		});
		for ent in entries {
			out.push(DirEntry {
				name: ent.name().to_vec(),
				ino: ent.ino,
			});
		}
		Ok(out)
	}
}

impl Drop for Imgfs {
	fn drop(&mut self) {
		let _ = self.sync();
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::inode::ROOT_INO;
	use tempfile::TempDir;

	fn new_fs(dir: &TempDir) -> Imgfs {
		Imgfs::mount(&dir.path().join("disk.img")).unwrap()
	}

	#[test]
	fn format_root_getattr() {
		let dir = TempDir::new().unwrap();
		let fs = new_fs(&dir);

		let stat = fs.getattr(Path::new("/")).unwrap();
		assert_eq!(stat.ino, ROOT_INO);
		assert_eq!(stat.file_type, FileType::Directory);
		assert_eq!(stat.size, 0);
		assert_eq!(stat.blocks, 1);
		assert_eq!(stat.nlink, 2);
	}

	#[test]
	fn relative_path_invalid() {
		let dir = TempDir::new().unwrap();
		let fs = new_fs(&dir);

		assert_eq!(fs.getattr(Path::new("a")).unwrap_err(), errno::EINVAL);
	}

	#[test]
	fn lookup_through_file() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/f")).unwrap();
		assert_eq!(fs.getattr(Path::new("/f/x")).unwrap_err(), errno::ENOTDIR);
	}

	#[test]
	fn create_write_read_nested() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.mkdir(Path::new("/a")).unwrap();
		fs.mkdir(Path::new("/a/b")).unwrap();
		fs.create(Path::new("/a/b/hello")).unwrap();
		assert_eq!(fs.write(Path::new("/a/b/hello"), b"hi", 0).unwrap(), 2);

		let mut buf = [0u8; 2];
		assert_eq!(fs.read(Path::new("/a/b/hello"), &mut buf, 0).unwrap(), 2);
		assert_eq!(&buf, b"hi");
		assert_eq!(fs.getattr(Path::new("/a/b/hello")).unwrap().size, 2);
	}

	#[test]
	fn create_existing_name() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/x")).unwrap();
		assert_eq!(fs.create(Path::new("/x")).unwrap_err(), errno::EEXIST);
		assert_eq!(fs.mkdir(Path::new("/x")).unwrap_err(), errno::EEXIST);
	}

	#[test]
	fn write_two_blocks() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/f")).unwrap();
		let data = [0x41u8; 600];
		assert_eq!(fs.write(Path::new("/f"), &data, 0).unwrap(), 600);

		let stat = fs.getattr(Path::new("/f")).unwrap();
		assert_eq!(stat.size, 600);
		assert_eq!(stat.blocks, 2);

		let mut buf = [0u8; 600];
		assert_eq!(fs.read(Path::new("/f"), &mut buf, 0).unwrap(), 600);
		assert_eq!(buf, data);
	}

	#[test]
	fn write_sparse_single_indirect() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/f")).unwrap();
		fs.write(Path::new("/f"), b"hi", 0).unwrap();
		assert_eq!(fs.write(Path::new("/f"), &[0x42], 10000).unwrap(), 1);

		let stat = fs.getattr(Path::new("/f")).unwrap();
		assert_eq!(stat.size, 10001);
		// The hole spans unassigned blocks; only the first block and the one
		// reached through the singly indirect pointer are assigned
		assert_eq!(stat.blocks, 2);

		let mut buf = vec![0xffu8; 10001];
		assert_eq!(fs.read(Path::new("/f"), &mut buf, 0).unwrap(), 10001);
		assert_eq!(&buf[..2], b"hi");
		assert!(buf[2..10000].iter().all(|b| *b == 0));
		assert_eq!(buf[10000], 0x42);
	}

	#[test]
	fn write_cross_block_rmw() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/f")).unwrap();
		fs.write(Path::new("/f"), &[0x41u8; 600], 0).unwrap();
		fs.write(Path::new("/f"), b"0123456789", 508).unwrap();

		let mut buf = [0u8; 600];
		assert_eq!(fs.read(Path::new("/f"), &mut buf, 0).unwrap(), 600);
		assert!(buf[..508].iter().all(|b| *b == 0x41));
		assert_eq!(&buf[508..518], b"0123456789");
		assert!(buf[518..].iter().all(|b| *b == 0x41));
	}

	#[test]
	fn read_past_eof() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/f")).unwrap();
		fs.write(Path::new("/f"), b"abcde", 0).unwrap();

		let mut buf = [0u8; 16];
		assert_eq!(fs.read(Path::new("/f"), &mut buf, 5).unwrap(), 0);
		assert_eq!(fs.read(Path::new("/f"), &mut buf, 100).unwrap(), 0);
		// A read crossing the end of the file is clamped
		assert_eq!(fs.read(Path::new("/f"), &mut buf, 3).unwrap(), 2);
		assert_eq!(&buf[..2], b"de");
	}

	#[test]
	fn inode_exhaustion() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		// The root occupies inode 0, leaving 255 free
		for i in 1..INODES_COUNT {
			let path = format!("/f{i}");
			assert_eq!(fs.create(Path::new(&path)).unwrap(), i);
		}
		assert_eq!(
			fs.create(Path::new("/overflow")).unwrap_err(),
			errno::ENOSPC
		);
	}

	#[test]
	fn unlink_restores_free_counts() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		let before = fs.statfs();
		fs.create(Path::new("/a")).unwrap();
		fs.write(Path::new("/a"), &[0x55u8; 8192], 0).unwrap();
		// 1 block at creation, 15 more leaves and 1 indirect block
		assert_eq!(fs.statfs().bfree, before.bfree - 17);
		assert_eq!(fs.statfs().ffree, before.ffree - 1);

		fs.unlink(Path::new("/a")).unwrap();
		assert_eq!(fs.statfs(), before);

		// FIFO allocation: the released inode rejoined at the tail
		assert_eq!(fs.create(Path::new("/b")).unwrap(), 2);
	}

	#[test]
	fn unlink_directory_fails() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.mkdir(Path::new("/d")).unwrap();
		assert_eq!(fs.unlink(Path::new("/d")).unwrap_err(), errno::EISDIR);
	}

	#[test]
	fn rmdir() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.mkdir(Path::new("/d")).unwrap();
		fs.create(Path::new("/d/f")).unwrap();
		assert_eq!(fs.rmdir(Path::new("/d")).unwrap_err(), errno::ENOTEMPTY);

		fs.unlink(Path::new("/d/f")).unwrap();
		fs.rmdir(Path::new("/d")).unwrap();
		assert_eq!(fs.getattr(Path::new("/d")).unwrap_err(), errno::ENOENT);
	}

	#[test]
	fn rmdir_on_file() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/f")).unwrap();
		assert_eq!(fs.rmdir(Path::new("/f")).unwrap_err(), errno::ENOTDIR);
		assert_eq!(fs.rmdir(Path::new("/")).unwrap_err(), errno::EBUSY);
	}

	#[test]
	fn mkdir_updates_parent_nlink() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		assert_eq!(fs.getattr(Path::new("/")).unwrap().nlink, 2);
		fs.mkdir(Path::new("/d")).unwrap();
		assert_eq!(fs.getattr(Path::new("/")).unwrap().nlink, 3);
		fs.rmdir(Path::new("/d")).unwrap();
		assert_eq!(fs.getattr(Path::new("/")).unwrap().nlink, 2);
	}

	#[test]
	fn readdir_lists_entries() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.mkdir(Path::new("/d")).unwrap();
		let d = fs.create(Path::new("/d/x")).unwrap();
		fs.create(Path::new("/d/y")).unwrap();

		let entries = fs.readdir(Path::new("/d")).unwrap();
		assert_eq!(entries.len(), 4);
		assert_eq!(entries[0].name, b".");
		assert_eq!(entries[1].name, b"..");
		assert_eq!(entries[1].ino, ROOT_INO);
		assert_eq!(entries[2].name, b"x");
		assert_eq!(entries[2].ino, d);
		assert_eq!(entries[3].name, b"y");

		assert_eq!(
			fs.readdir(Path::new("/d/x")).unwrap_err(),
			errno::ENOTDIR
		);
	}

	#[test]
	fn open_type_checks() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/f")).unwrap();
		fs.mkdir(Path::new("/d")).unwrap();

		fs.open(Path::new("/f")).unwrap();
		assert_eq!(fs.open(Path::new("/d")).unwrap_err(), errno::EISDIR);
		assert_eq!(fs.open(Path::new("/missing")).unwrap_err(), errno::ENOENT);

		fs.opendir(Path::new("/d")).unwrap();
		assert_eq!(fs.opendir(Path::new("/f")).unwrap_err(), errno::ENOTDIR);
		fs.releasedir(Path::new("/d")).unwrap();
	}

	#[test]
	fn persistence_across_remount() {
		let dir = TempDir::new().unwrap();
		let image = dir.path().join("disk.img");

		let mut fs = Imgfs::mount(&image).unwrap();
		fs.mkdir(Path::new("/d")).unwrap();
		fs.create(Path::new("/d/f")).unwrap();
		fs.write(Path::new("/d/f"), b"persist", 0).unwrap();
		let bfree = fs.statfs().bfree;
		fs.unmount().unwrap();

		let mut fs = Imgfs::mount(&image).unwrap();
		assert!(Imgfs::detect(&image).unwrap());
		assert_eq!(fs.statfs().bfree, bfree);

		let entries = fs.readdir(Path::new("/d")).unwrap();
		assert_eq!(entries[2].name, b"f");

		let mut buf = [0u8; 7];
		assert_eq!(fs.read(Path::new("/d/f"), &mut buf, 0).unwrap(), 7);
		assert_eq!(&buf, b"persist");
	}

	#[test]
	fn dentry_compaction() {
		let dir = TempDir::new().unwrap();
		let mut fs = new_fs(&dir);

		fs.create(Path::new("/a")).unwrap();
		fs.create(Path::new("/b")).unwrap();
		fs.create(Path::new("/c")).unwrap();
		fs.unlink(Path::new("/a")).unwrap();

		// The tail entry moved into the vacated slot
		let entries = fs.readdir(Path::new("/")).unwrap();
		assert_eq!(entries.len(), 4);
		assert_eq!(entries[2].name, b"c");
		assert_eq!(entries[3].name, b"b");
		assert_eq!(fs.getattr(Path::new("/")).unwrap().size, 128);
	}
}

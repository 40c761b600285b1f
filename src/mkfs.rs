//! The `mkfs` tool creates an empty filesystem inside a disk image file.

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::exit;

use imgfs::Imgfs;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,
	/// If true, overwrite an existing filesystem.
	force: bool,
	/// If true, print command line help.
	help: bool,
	/// The path to the image file on which the filesystem will be created.
	image_path: Option<PathBuf>,
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or("mkfs".to_owned());

	for arg in iter {
		match arg.as_str() {
			"-f" | "--force" => args.force = true,
			"-h" | "--help" => args.help = true,
			_ if arg.starts_with('-') => {
				eprintln!("{}: invalid option `{}`", args.prog, arg);
				exit(1);
			}
			_ => args.image_path = Some(PathBuf::from(arg)),
		}
	}

	args
}

fn main() {
	env_logger::init();
	let args = parse_args();
	if args.help {
		println!("usage: {} [-f] <image>", args.prog);
		return;
	}
	let image_path = args.image_path.unwrap_or_else(|| {
		eprintln!("usage: {} [-f] <image>", args.prog);
		exit(1);
	});

	let present = Imgfs::detect(&image_path).unwrap_or_else(|errno| {
		eprintln!("{}: {}: errno {}", args.prog, image_path.display(), errno);
		exit(1);
	});
	if present {
		if !args.force {
			eprintln!(
				"{}: {} already contains a filesystem",
				args.prog,
				image_path.display()
			);
			exit(1);
		}
		// Truncating makes the mount below run the format
		OpenOptions::new()
			.write(true)
			.truncate(true)
			.open(&image_path)
			.unwrap_or_else(|e| {
				eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
				exit(1);
			});
	}

	let fs = Imgfs::mount(&image_path).unwrap_or_else(|errno| {
		eprintln!("{}: failed to create filesystem: errno {}", args.prog, errno);
		exit(1);
	});
	let stat = fs.statfs();
	println!(
		"{}: {} blocks of {} bytes, {} inodes",
		image_path.display(),
		stat.blocks,
		stat.bsize,
		stat.files
	);
	if let Err(errno) = fs.unmount() {
		eprintln!("{}: failed to write superblock: errno {}", args.prog, errno);
		exit(1);
	}
}

/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! Atomic file creation: a file at a target path either ends up fully
//! present with its final contents, or isn't there at all.
//!
//! Implemented with `O_TMPFILE` (an anonymous, unnamed file living only in
//! the target directory's filesystem) plus `posix_fallocate` for
//! preallocation, and linked into place with `linkat` once writing is
//! done. If the name already exists, the anonymous file is silently
//! discarded — another worker or a prior run already won this block.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{fallocate, open, FallocateFlags, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{fdatasync, linkat, LinkatFlags};

/// A file opened anonymously in the target directory, not yet linked to
/// any name.
pub struct AtomicFile {
    file: File,
    target: std::path::PathBuf,
    linked: bool,
}

impl AtomicFile {
    /// Open an anonymous file in the parent directory of `path`, creating
    /// the parent directory if it doesn't exist. If `size` is given, the
    /// file is preallocated to that many bytes before any write.
    pub fn create(path: &Path, size: Option<u64>, mode: u32) -> io::Result<Self> {
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory)?;

        let fd = open(
            directory,
            OFlag::O_WRONLY | OFlag::O_TMPFILE,
            Mode::from_bits_truncate(mode),
        )
        .map_err(nix_to_io)?;

        let file = File::from(fd);

        if let Some(size) = size {
            fallocate(&file, FallocateFlags::empty(), 0, size as i64).map_err(nix_to_io)?;
        }

        Ok(Self {
            file,
            target: path.to_path_buf(),
            linked: false,
        })
    }

    /// Borrow the underlying file for writing.
    pub fn file(&mut self) -> &mut File {
        &mut self.file
    }

    /// Flush, sync to stable storage, and atomically link this anonymous
    /// file into place at the target path. If a file already exists
    /// there, the existing file wins and this one is discarded.
    pub fn finish(mut self) -> io::Result<()> {
        use std::io::Write;

        self.file.flush()?;
        fdatasync(&self.file).map_err(nix_to_io)?;

        let fd_path = format!("/proc/self/fd/{}", self.file.as_raw_fd());
        match linkat(
            None,
            Path::new(&fd_path),
            None,
            self.target.as_path(),
            LinkatFlags::SymlinkFollow,
        ) {
            Ok(()) => {}
            Err(Errno::EEXIST) => {
                // The destination name already won; discard this copy.
            }
            Err(e) => return Err(nix_to_io(e)),
        }

        self.linked = true;
        Ok(())
    }
}

// Anonymous files opened with O_TMPFILE vanish on close unless linked, so
// there is nothing to clean up on an early drop/error path: the OS does it.
impl Drop for AtomicFile {
    fn drop(&mut self) {
        let _ = self.linked;
    }
}

fn nix_to_io(e: Errno) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write as _};
    use tempfile::tempdir;

    #[test]
    fn writes_and_links_a_new_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("block").join("1 of 1");

        let mut atomic = AtomicFile::create(&target, Some(5), 0o444).unwrap();
        atomic.file().write_all(b"hello").unwrap();
        atomic.finish().unwrap();

        let mut contents = String::new();
        File::open(&target)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn existing_file_wins_over_a_fresh_write() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("1 of 1");
        std::fs::write(&target, b"first").unwrap();

        let mut atomic = AtomicFile::create(&target, None, 0o444).unwrap();
        atomic.file().write_all(b"second").unwrap();
        atomic.finish().unwrap();

        let contents = std::fs::read_to_string(&target).unwrap();
        assert_eq!(contents, "first");
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("dir").join("1 of 1");
        let mut atomic = AtomicFile::create(&target, None, 0o444).unwrap();
        atomic.file().write_all(b"x").unwrap();
        atomic.finish().unwrap();
        assert!(target.exists());
    }
}

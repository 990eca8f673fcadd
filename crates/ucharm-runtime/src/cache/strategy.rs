//! Interpreter extraction strategies.
//!
//! - **DiskBacked**: regular executable file inside the cache entry (all targets)
//! - **MemoryBacked**: anonymous `memfd` executed through `/proc/self/fd`
//!   (Linux, `memfd` feature)
//!
//! The strategy is chosen at compile time through [`PlatformStrategy`].

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::atomic::AtomicFile;

/// File name of the extracted interpreter inside a cache entry.
pub const INTERPRETER_FILE: &str = "interpreter";

/// Something the exec dispatcher can launch.
#[derive(Debug)]
pub enum Executable {
    /// Executable file on disk.
    Path(PathBuf),

    /// Anonymous memory-backed file. Must stay open until exec.
    #[cfg(target_os = "linux")]
    Memory(std::os::fd::OwnedFd),
}

impl Executable {
    /// Path to hand to `execve`.
    pub fn exec_path(&self) -> PathBuf {
        match self {
            Executable::Path(path) => path.clone(),
            #[cfg(target_os = "linux")]
            Executable::Memory(fd) => {
                use std::os::fd::AsRawFd;
                PathBuf::from(format!("/proc/self/fd/{}", fd.as_raw_fd()))
            }
        }
    }

    /// True when the interpreter lives in the cache directory.
    pub fn is_on_disk(&self) -> bool {
        matches!(self, Executable::Path(_))
    }
}

/// Create, fill and finalize an extracted interpreter.
pub trait ExtractStrategy {
    /// Writer receiving the interpreter bytes.
    type Sink: Write;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Interpreter already materialized for this entry, if any.
    fn existing(&self, entry_dir: &Path) -> Option<Executable>;

    /// Start materializing the interpreter for this entry.
    fn create(&self, entry_dir: &Path) -> io::Result<Self::Sink>;

    /// Finish writing and return a launchable handle.
    fn finish(&self, sink: Self::Sink) -> io::Result<Executable>;
}

/// Interpreter stored as `<entry>/interpreter` with mode 0755.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskBacked;

impl ExtractStrategy for DiskBacked {
    type Sink = AtomicFile;

    fn name(&self) -> &'static str {
        "disk"
    }

    fn existing(&self, entry_dir: &Path) -> Option<Executable> {
        let path = entry_dir.join(INTERPRETER_FILE);
        path.is_file().then_some(Executable::Path(path))
    }

    fn create(&self, entry_dir: &Path) -> io::Result<AtomicFile> {
        AtomicFile::create(entry_dir, INTERPRETER_FILE)
    }

    fn finish(&self, sink: AtomicFile) -> io::Result<Executable> {
        sink.commit(true).map(Executable::Path)
    }
}

/// Interpreter kept in an anonymous memory file; nothing is written to disk.
#[cfg(target_os = "linux")]
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBacked;

#[cfg(target_os = "linux")]
impl ExtractStrategy for MemoryBacked {
    type Sink = std::fs::File;

    fn name(&self) -> &'static str {
        "memfd"
    }

    fn existing(&self, _entry_dir: &Path) -> Option<Executable> {
        None
    }

    fn create(&self, _entry_dir: &Path) -> io::Result<std::fs::File> {
        use std::os::fd::FromRawFd;

        // Safety: the name is a valid NUL-terminated C string.
        let fd = unsafe { libc::memfd_create(c"ucharm-interpreter".as_ptr(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // Safety: `fd` was just returned by memfd_create and is owned by nobody else.
        Ok(unsafe { std::fs::File::from_raw_fd(fd) })
    }

    fn finish(&self, sink: std::fs::File) -> io::Result<Executable> {
        use std::os::fd::AsRawFd;

        // execve refuses a file with open writers, so swap the writable
        // descriptor for a read-only one on the same memfd.
        let readonly = std::fs::File::open(format!("/proc/self/fd/{}", sink.as_raw_fd()))?;
        drop(sink);
        Ok(Executable::Memory(readonly.into()))
    }
}

#[cfg(all(target_os = "linux", feature = "memfd"))]
pub type PlatformStrategy = MemoryBacked;

#[cfg(not(all(target_os = "linux", feature = "memfd")))]
pub type PlatformStrategy = DiskBacked;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_disk_backed_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = DiskBacked;
        assert!(strategy.existing(dir.path()).is_none());

        let mut sink = strategy.create(dir.path()).unwrap();
        sink.write_all(b"\x7fELF fake").unwrap();
        let exe = strategy.finish(sink).unwrap();

        assert!(exe.is_on_disk());
        assert_eq!(exe.exec_path(), dir.path().join(INTERPRETER_FILE));
        assert_eq!(fs::read(exe.exec_path()).unwrap(), b"\x7fELF fake");
        assert!(strategy.existing(dir.path()).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_backed_sets_exec_bit() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DiskBacked.create(dir.path()).unwrap();
        sink.write_all(b"x").unwrap();
        let exe = DiskBacked.finish(sink).unwrap();
        let mode = fs::metadata(exe.exec_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memory_backed_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MemoryBacked.create(dir.path()).unwrap();
        sink.write_all(b"payload").unwrap();
        let exe = MemoryBacked.finish(sink).unwrap();

        assert!(!exe.is_on_disk());
        assert!(exe.exec_path().starts_with("/proc/self/fd"));
        assert_eq!(fs::read(exe.exec_path()).unwrap(), b"payload");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

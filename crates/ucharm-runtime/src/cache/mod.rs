//! Content-addressed extraction cache
//!
//! Materializes the payloads of a bundle under a per-user cache root:
//!
//! ```text
//! ~/.cache/ucharm/
//! ├── <sha256-hex>/
//! │   ├── interpreter   (0755)
//! │   └── app.py
//! └── <sha256-hex>/
//!     └── ...
//! ```
//!
//! Entries are created lazily and never removed. Concurrent processes may
//! race to fill the same entry; since the directory name is a hash of the
//! bytes being written, every racer writes identical files and no locking
//! is needed.

mod atomic;
pub mod strategy;

pub use strategy::{DiskBacked, Executable, ExtractStrategy, PlatformStrategy, INTERPRETER_FILE};

#[cfg(target_os = "linux")]
pub use strategy::MemoryBacked;

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::bundle::{ContentHash, Trailer};
use crate::error::BundleError;
use atomic::AtomicFile;

/// File name of the extracted script inside a cache entry.
pub const SCRIPT_FILE: &str = "app.py";

/// A usable cache entry.
#[derive(Debug)]
pub struct CacheEntry {
    /// `<root>/<hash>/`
    pub dir: PathBuf,

    /// Extracted interpreter.
    pub interpreter: Executable,

    /// Extracted script.
    pub script: PathBuf,

    /// True when this call wrote at least one file.
    pub fresh: bool,
}

/// Handle to a cache root. Cheap to clone; holds no open resources.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Cache rooted at an explicit directory. Nothing is created until the
    /// first miss.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache at the per-user default location.
    pub fn user_default() -> Self {
        Self::new(Self::default_root())
    }

    /// `<platform cache dir>/ucharm`, falling back to `~/.cache/ucharm`,
    /// then to the system temp directory.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .unwrap_or_else(std::env::temp_dir)
            .join("ucharm")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a given content hash.
    pub fn entry_dir(&self, key: &ContentHash) -> PathBuf {
        self.root.join(key.to_hex())
    }

    /// Return the entry for `key`, extracting it from `source` on a miss.
    ///
    /// The warm path only checks for existing files and writes nothing.
    pub fn resolve<R, S>(
        &self,
        source: &mut R,
        trailer: &Trailer,
        key: &ContentHash,
        strategy: &S,
    ) -> Result<CacheEntry, BundleError>
    where
        R: Read + Seek,
        S: ExtractStrategy,
    {
        let dir = self.entry_dir(key);
        let script = dir.join(SCRIPT_FILE);

        if script.is_file() {
            if let Some(interpreter) = strategy.existing(&dir) {
                tracing::debug!(entry = %dir.display(), "cache hit");
                return Ok(CacheEntry { dir, interpreter, script, fresh: false });
            }
        }

        tracing::debug!(entry = %dir.display(), strategy = strategy.name(), "cache miss, extracting");
        fs::create_dir_all(&dir).map_err(BundleError::extract(&dir))?;

        let mut fresh = false;
        let interpreter = match strategy.existing(&dir) {
            Some(existing) => existing,
            None => {
                let target = dir.join(INTERPRETER_FILE);
                let mut sink = strategy.create(&dir).map_err(BundleError::extract(&target))?;
                copy_range(source, trailer.interpreter_offset, trailer.interpreter_size, &mut sink)
                    .map_err(BundleError::extract(&target))?;
                fresh = true;
                strategy.finish(sink).map_err(BundleError::extract(&target))?
            }
        };

        if !script.is_file() {
            let mut file = AtomicFile::create(&dir, SCRIPT_FILE).map_err(BundleError::extract(&script))?;
            copy_range(source, trailer.script_offset, trailer.script_size, &mut file)
                .map_err(BundleError::extract(&script))?;
            file.commit(false).map_err(BundleError::extract(&script))?;
            fresh = true;
        }

        Ok(CacheEntry { dir, interpreter, script, fresh })
    }
}

/// Copy exactly `size` bytes starting at `offset`.
fn copy_range<R: Read + Seek, W: Write>(source: &mut R, offset: u64, size: u64, dest: &mut W) -> io::Result<()> {
    source.seek(SeekFrom::Start(offset))?;
    let copied = io::copy(&mut (&mut *source).take(size), dest)?;
    if copied != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("payload at {} ended after {} of {} bytes", offset, copied, size),
        ));
    }
    tracing::trace!(offset, size, "copied payload range");
    Ok(())
}

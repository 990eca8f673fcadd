//! Write-then-rename files.
//!
//! Readers only ever see a cache file once it is complete: data goes to a
//! temporary name unique to this process and writer, in the same directory,
//! and is renamed over the final name on commit.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bundle::assemble::set_executable;

static NEXT_TMP: AtomicU64 = AtomicU64::new(0);

pub struct AtomicFile {
    file: Option<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl AtomicFile {
    /// Start writing `dir/name`.
    pub fn create(dir: &Path, name: &str) -> io::Result<Self> {
        let final_path = dir.join(name);
        let seq = NEXT_TMP.fetch_add(1, Ordering::Relaxed);
        let tmp_path = dir.join(format!(".{}.tmp-{}-{}", name, std::process::id(), seq));
        let file = File::create(&tmp_path)?;
        Ok(Self { file: Some(file), tmp_path, final_path })
    }

    /// Flush to disk and move into place.
    ///
    /// Another process may have committed the same name first. Its bytes are
    /// identical (same content hash), so losing that race is success.
    pub fn commit(mut self, executable: bool) -> io::Result<PathBuf> {
        if let Some(file) = self.file.take() {
            if executable {
                set_executable(&file)?;
            }
            file.sync_all()?;
            // Closed before the rename: an executable still open for writing
            // cannot be exec'd (ETXTBSY).
        }

        match fs::rename(&self.tmp_path, &self.final_path) {
            Ok(()) => {}
            Err(_) if self.final_path.is_file() => {}
            Err(e) => return Err(e),
        }
        Ok(self.final_path.clone())
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        // Gone after a successful rename; garbage otherwise.
        let _ = fs::remove_file(&self.tmp_path);
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("write after commit")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_visible_before_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = AtomicFile::create(dir.path(), "app.py").unwrap();
        f.write_all(b"print(1)").unwrap();
        assert!(!dir.path().join("app.py").exists());

        let path = f.commit(false).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"print(1)");
    }

    #[test]
    fn test_commit_over_existing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), b"same").unwrap();

        let mut f = AtomicFile::create(dir.path(), "app.py").unwrap();
        f.write_all(b"same").unwrap();
        f.commit(false).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_dropped_without_commit_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = AtomicFile::create(dir.path(), "interpreter").unwrap();
        f.write_all(b"partial").unwrap();
        drop(f);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

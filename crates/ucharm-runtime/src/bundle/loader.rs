//! Bundle loader
//!
//! Run-time entry point baked into every shipped binary:
//! 1. Locate the running executable
//! 2. Read and validate the trailer at its end
//! 3. Hash the two payload ranges
//! 4. Resolve the cache entry (extract on miss)
//! 5. Exec the interpreter with the script and forwarded arguments
//!
//! Steps 1–4 return to the caller; step 5 does not on success.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::format::Trailer;
use super::hash::{hash_payloads, ContentHash};
use crate::cache::{Cache, CacheEntry, ExtractStrategy, PlatformStrategy};
use crate::error::BundleError;
use crate::exec;

/// Per-invocation state, discarded on exec or error.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Absolute path of the bundle being run.
    pub exe_path: PathBuf,

    /// Decoded, validated trailer.
    pub trailer: Trailer,

    /// Cache key.
    pub key: ContentHash,

    /// Extracted interpreter and script.
    pub entry: CacheEntry,
}

/// Open a bundle and return its validated trailer.
///
/// Fails with `TooSmall`, `BadMagic` or `BadTrailerValues` before any
/// payload byte is read.
pub fn open_bundle(path: &Path) -> Result<(File, Trailer), BundleError> {
    let mut file = File::open(path).map_err(BundleError::LocateSelf)?;
    let (trailer, size) = Trailer::read_from(&mut file)?;

    if !trailer.is_valid() || !trailer.fits(size) {
        return Err(BundleError::BadTrailerValues);
    }
    Ok((file, trailer))
}

/// Read a bundle's trailer and cache key without extracting anything.
pub fn inspect(path: &Path) -> Result<(Trailer, ContentHash), BundleError> {
    let (mut file, trailer) = open_bundle(path)?;
    let key = hash_payloads(&mut file, &trailer)?;
    Ok((trailer, key))
}

/// Steps 2–4 for the bundle at `exe_path`, with the platform strategy.
pub fn prepare(exe_path: &Path, cache: &Cache) -> Result<ExecutionContext, BundleError> {
    prepare_with(exe_path, cache, &PlatformStrategy::default())
}

/// Steps 2–4 for the bundle at `exe_path`.
pub fn prepare_with<S: ExtractStrategy>(
    exe_path: &Path,
    cache: &Cache,
    strategy: &S,
) -> Result<ExecutionContext, BundleError> {
    let (mut file, trailer) = open_bundle(exe_path)?;
    let key = hash_payloads(&mut file, &trailer)?;
    let entry = cache.resolve(&mut file, &trailer, &key, strategy)?;

    Ok(ExecutionContext {
        exe_path: exe_path.to_path_buf(),
        trailer,
        key,
        entry,
    })
}

/// Resolve the absolute path of the running executable.
pub fn locate_self() -> Result<PathBuf, BundleError> {
    std::env::current_exe().map_err(BundleError::LocateSelf)
}

/// Full bootstrap: locate, prepare and exec.
///
/// `args` are the user arguments, i.e. the process arguments minus argv[0].
/// Returns only on failure.
pub fn run<I>(cache: &Cache, args: I) -> BundleError
where
    I: IntoIterator<Item = OsString>,
{
    let ctx = match locate_self().and_then(|exe| prepare(&exe, cache)) {
        Ok(ctx) => ctx,
        Err(e) => return e,
    };
    exec::replace_process(&ctx.entry.interpreter, &ctx.entry.script, args)
}

//! Error types shared by the loader, cache and assembler.

use std::path::PathBuf;

use crate::bundle::TRAILER_SIZE;

/// Everything that can go wrong between reading a bundle and launching it.
///
/// Variants fall into three classes: structural problems with the artifact
/// (detected before any extraction), extraction I/O, and exec failure.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// The executable could not be resolved or opened
    #[error("cannot open executable: {0}")]
    LocateSelf(#[source] std::io::Error),

    /// File is shorter than the trailer
    #[error("binary too small ({size} bytes, trailer needs {trailer})", trailer = TRAILER_SIZE)]
    TooSmall { size: u64 },

    /// Magic tag mismatch at either end of the trailer
    #[error("bad trailer: magic mismatch")]
    BadMagic,

    /// Trailer decoded but describes an impossible layout
    #[error("bad trailer values")]
    BadTrailerValues,

    /// Assembler input was empty
    #[error("{which} payload is empty")]
    EmptyPayload { which: &'static str },

    /// Writing a cache entry failed
    #[error("extraction failed at {}: {source}", path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Extracted files exist but the interpreter could not be started
    #[error("cannot execute {}: {source}", path.display())]
    Exec {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl BundleError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            BundleError::TooSmall { .. }
            | BundleError::BadMagic
            | BundleError::BadTrailerValues => 2,
            BundleError::Extract { .. } => 3,
            BundleError::Exec { .. } => 126,
            BundleError::LocateSelf(_)
            | BundleError::EmptyPayload { .. }
            | BundleError::Io(_) => 1,
        }
    }

    pub(crate) fn extract(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| BundleError::Extract { path, source }
    }
}

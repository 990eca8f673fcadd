//! Bundle format, assembly, and loading
//!
//! Handles the payload appended to the ucharm stub:
//! - **format**: trailer layout and codec
//! - **assemble**: build-time writer for the single-file artifact
//! - **hash**: content hash used as the cache key
//! - **loader**: self-detection and bootstrap

pub mod assemble;
pub mod format;
pub mod hash;
pub mod loader;

pub use assemble::{assemble, assemble_files};
pub use format::{Trailer, TRAILER_MAGIC, TRAILER_SIZE};
pub use hash::{hash_payloads, ContentHash};
pub use loader::{inspect, open_bundle, prepare, prepare_with, ExecutionContext};

//! ucharm runtime
//!
//! Self-contained binary format and the machinery that runs it: trailer
//! codec, assembler, content-addressed extraction cache, loader and exec
//! dispatcher. Script source is never parsed here; bytes are moved and a
//! process is launched.

pub mod bundle;
pub mod cache;
pub mod error;
pub mod exec;

pub use bundle::{ContentHash, Trailer, TRAILER_MAGIC, TRAILER_SIZE};
pub use cache::{Cache, CacheEntry};
pub use error::BundleError;

//! Content hash over the two payload ranges.
//!
//! The hash is the cache key. Any change to either payload yields a new key,
//! so every rebuild of an application gets its own cache entry.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use sha2::{Digest, Sha256};

use super::format::Trailer;

/// Chunk size for streamed reads.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 digest of the interpreter payload followed by the script payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, used as the cache entry directory name.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hash in-memory payloads. Produces the same key as [`hash_payloads`]
    /// over a file holding these bytes.
    pub fn of_slices(interpreter: &[u8], script: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(interpreter);
        hasher.update(script);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash both payload ranges of `source` as described by `trailer`.
///
/// Reads in `CHUNK_SIZE` pieces; the payloads are never held in memory whole.
pub fn hash_payloads<R: Read + Seek>(source: &mut R, trailer: &Trailer) -> io::Result<ContentHash> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    for (offset, size) in [
        (trailer.interpreter_offset, trailer.interpreter_size),
        (trailer.script_offset, trailer.script_size),
    ] {
        source.seek(SeekFrom::Start(offset))?;
        let mut range = (&mut *source).take(size);
        let mut seen = 0u64;
        loop {
            let n = range.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            seen += n as u64;
        }
        if seen != size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload at {} ended after {} of {} bytes", offset, seen, size),
            ));
        }
    }

    Ok(ContentHash(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bundle(stub: &[u8], interp: &[u8], script: &[u8]) -> (Vec<u8>, Trailer) {
        let trailer = Trailer::for_layout(stub.len() as u64, interp.len() as u64, script.len() as u64);
        let mut data = Vec::new();
        data.extend_from_slice(stub);
        data.extend_from_slice(interp);
        data.extend_from_slice(script);
        data.extend_from_slice(&trailer.to_bytes());
        (data, trailer)
    }

    #[test]
    fn test_hash_matches_slices() {
        let interp = vec![0xAB; CHUNK_SIZE * 2 + 17];
        let (data, trailer) = bundle(b"stub", &interp, b"print('hi')");
        let hash = hash_payloads(&mut Cursor::new(data), &trailer).unwrap();
        assert_eq!(hash, ContentHash::of_slices(&interp, b"print('hi')"));
    }

    #[test]
    fn test_hash_ignores_stub() {
        let (a, ta) = bundle(b"stub-one", b"interp", b"script");
        let (b, tb) = bundle(b"another stub", b"interp", b"script");
        let ha = hash_payloads(&mut Cursor::new(a), &ta).unwrap();
        let hb = hash_payloads(&mut Cursor::new(b), &tb).unwrap();
        assert_eq!(ha, hb);
    }

    #[test]
    fn test_hash_changes_with_script() {
        let (a, ta) = bundle(b"stub", b"interp", b"script-a");
        let (b, tb) = bundle(b"stub", b"interp", b"script-b");
        let ha = hash_payloads(&mut Cursor::new(a), &ta).unwrap();
        let hb = hash_payloads(&mut Cursor::new(b), &tb).unwrap();
        assert_ne!(ha, hb);
    }

    #[test]
    fn test_hash_short_payload_is_error() {
        let trailer = Trailer::for_layout(1, 100, 100);
        let err = hash_payloads(&mut Cursor::new(vec![0u8; 50]), &trailer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_hex_is_lowercase_64_chars() {
        let hex = ContentHash::of_slices(b"a", b"b").to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}

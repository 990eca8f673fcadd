//! Binary payload format
//!
//! Defines the layout of a self-contained ucharm executable.
//!
//! ```text
//! ┌─────────────────────────┐
//! │  ucharm-stub            │  ← native loader, unchanged
//! ├─────────────────────────┤
//! │  Interpreter payload    │  ← opaque native executable
//! ├─────────────────────────┤
//! │  Script payload         │  ← application source
//! ├─────────────────────────┤
//! │  Trailer (48 bytes)     │  ← fixed-size, at very end of file
//! └─────────────────────────┘
//! ```
//!
//! All trailer integers are little-endian `u64`, regardless of host byte order.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::BundleError;

/// Magic bytes identifying a ucharm trailer. Stored at both ends of the trailer.
pub const TRAILER_MAGIC: [u8; 8] = *b"UCHARM\0\x01";

/// Size of the trailer in bytes.
pub const TRAILER_SIZE: usize = 48;

/// Fixed-size trailer at the very end of a bundled binary.
///
/// To detect whether a file is a bundle, read the last `TRAILER_SIZE`
/// bytes and decode them with [`Trailer::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Byte offset of the interpreter payload from the start of the file.
    pub interpreter_offset: u64,

    /// Size of the interpreter payload in bytes.
    pub interpreter_size: u64,

    /// Byte offset of the script payload from the start of the file.
    pub script_offset: u64,

    /// Size of the script payload in bytes.
    pub script_size: u64,
}

impl Trailer {
    /// Decode a trailer from exactly `TRAILER_SIZE` bytes.
    ///
    /// Both magic tags are checked so that damage at either end of the
    /// record is caught.
    pub fn parse(bytes: &[u8; TRAILER_SIZE]) -> Result<Self, BundleError> {
        if bytes[..8] != TRAILER_MAGIC || bytes[40..] != TRAILER_MAGIC {
            return Err(BundleError::BadMagic);
        }

        Ok(Self {
            interpreter_offset: read_u64(bytes, 8),
            interpreter_size: read_u64(bytes, 16),
            script_offset: read_u64(bytes, 24),
            script_size: read_u64(bytes, 32),
        })
    }

    /// Encode the trailer. Inverse of [`Trailer::parse`].
    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut bytes = [0u8; TRAILER_SIZE];
        bytes[..8].copy_from_slice(&TRAILER_MAGIC);
        bytes[8..16].copy_from_slice(&self.interpreter_offset.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.interpreter_size.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.script_offset.to_le_bytes());
        bytes[32..40].copy_from_slice(&self.script_size.to_le_bytes());
        bytes[40..].copy_from_slice(&TRAILER_MAGIC);
        bytes
    }

    /// Check that the fields describe a possible layout.
    ///
    /// A trailer can parse cleanly and still be nonsense, so this is a
    /// separate check from magic validation.
    pub fn is_valid(&self) -> bool {
        self.interpreter_offset != 0
            && self.interpreter_size != 0
            && self.script_size != 0
            && self.script_offset > self.interpreter_offset
    }

    /// Check that both payload ranges lie before the trailer of a file
    /// that is `file_len` bytes long.
    pub fn fits(&self, file_len: u64) -> bool {
        let Some(limit) = file_len.checked_sub(TRAILER_SIZE as u64) else {
            return false;
        };
        let interpreter_end = self.interpreter_offset.checked_add(self.interpreter_size);
        let script_end = self.script_offset.checked_add(self.script_size);
        matches!(
            (interpreter_end, script_end),
            (Some(i), Some(s)) if i <= limit && s <= limit && i <= self.script_offset
        )
    }

    /// Write the encoded trailer to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Read and decode the trailer stored at the end of `file`.
    ///
    /// Returns the trailer together with the file length. Fails with
    /// `TooSmall` before any read when the file cannot hold a trailer.
    pub fn read_from(file: &mut File) -> Result<(Self, u64), BundleError> {
        let size = file.metadata()?.len();
        if size < TRAILER_SIZE as u64 {
            return Err(BundleError::TooSmall { size });
        }

        let mut bytes = [0u8; TRAILER_SIZE];
        file.seek(SeekFrom::Start(size - TRAILER_SIZE as u64))?;
        file.read_exact(&mut bytes)?;
        Ok((Self::parse(&bytes)?, size))
    }

    /// Layout for a stub of `stub_len` bytes followed by the two payloads.
    pub fn for_layout(stub_len: u64, interpreter_size: u64, script_size: u64) -> Self {
        Self {
            interpreter_offset: stub_len,
            interpreter_size,
            script_offset: stub_len + interpreter_size,
            script_size,
        }
    }
}

fn read_u64(bytes: &[u8; TRAILER_SIZE], at: usize) -> u64 {
    let mut field = [0u8; 8];
    field.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Trailer {
        Trailer {
            interpreter_offset: 50_000,
            interpreter_size: 668_000,
            script_offset: 718_000,
            script_size: 35_000,
        }
    }

    #[test]
    fn test_trailer_roundtrip() {
        let trailer = sample();
        let restored = Trailer::parse(&trailer.to_bytes()).unwrap();
        assert_eq!(restored, trailer);
    }

    #[test]
    fn test_trailer_roundtrip_beyond_4gib() {
        let trailer = Trailer {
            interpreter_offset: 1,
            interpreter_size: 5 << 30,
            script_offset: (5 << 30) + 1,
            script_size: u64::MAX - (5 << 30) - 1,
        };
        assert_eq!(Trailer::parse(&trailer.to_bytes()).unwrap(), trailer);
    }

    #[test]
    fn test_trailer_is_little_endian() {
        let bytes = Trailer {
            interpreter_offset: 0x0102,
            interpreter_size: 1,
            script_offset: 0x0103,
            script_size: 1,
        }
        .to_bytes();
        assert_eq!(&bytes[8..16], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[..8], &TRAILER_MAGIC);
        assert_eq!(&bytes[40..], &TRAILER_MAGIC);
    }

    #[test]
    fn test_trailer_invalid_magic() {
        let bytes = [0u8; TRAILER_SIZE];
        assert!(matches!(Trailer::parse(&bytes), Err(BundleError::BadMagic)));
    }

    #[test]
    fn test_trailer_damaged_tail_magic() {
        let mut bytes = sample().to_bytes();
        bytes[TRAILER_SIZE - 1] ^= 0xFF;
        assert!(matches!(Trailer::parse(&bytes), Err(BundleError::BadMagic)));

        let mut bytes = sample().to_bytes();
        bytes[0] ^= 0xFF;
        assert!(matches!(Trailer::parse(&bytes), Err(BundleError::BadMagic)));
    }

    #[test]
    fn test_validity_boundary() {
        assert!(sample().is_valid());

        let zero_interp = Trailer { interpreter_size: 0, ..sample() };
        assert!(!zero_interp.is_valid());

        let zero_script = Trailer { script_size: 0, ..sample() };
        assert!(!zero_script.is_valid());

        let zero_offset = Trailer { interpreter_offset: 0, ..sample() };
        assert!(!zero_offset.is_valid());

        let same_offset = Trailer { script_offset: 50_000, ..sample() };
        assert!(!same_offset.is_valid());

        let before = Trailer { script_offset: 49_999, ..sample() };
        assert!(!before.is_valid());
    }

    #[test]
    fn test_fits() {
        let t = Trailer::for_layout(10, 1000, 200);
        assert!(t.fits(10 + 1000 + 200 + TRAILER_SIZE as u64));
        assert!(!t.fits(10 + 1000 + 199 + TRAILER_SIZE as u64));
        assert!(!t.fits(TRAILER_SIZE as u64 - 1));

        let overflow = Trailer { script_size: u64::MAX, ..t };
        assert!(!overflow.fits(u64::MAX));

        let overlapping = Trailer { script_offset: 500, ..t };
        assert!(!overlapping.fits(10_000));
    }

    #[test]
    fn test_for_layout() {
        let t = Trailer::for_layout(10, 1000, 200);
        assert_eq!(t, Trailer {
            interpreter_offset: 10,
            interpreter_size: 1000,
            script_offset: 1010,
            script_size: 200,
        });
        assert!(t.is_valid());
    }
}

//! Content hash identity and verification for cached artifacts.
//!
//! A [`ContentHash`] is the only stable identity in the cache: a Keccak-256
//! digest rendered as lowercase hex. [`verify_file`] recomputes the digest of
//! a file on disk and reports a [`VerifyError::HashMismatch`] when it differs.
//!
//! # Example
//!
//! ```
//! use hashfetch_verify::{ContentHash, KeccakHasher, VerifiedReader};
//!
//! let data = b"hello world";
//! let expected = ContentHash::from_digest(KeccakHasher::digest(data));
//!
//! let mut reader = VerifiedReader::new(&data[..], KeccakHasher::new());
//! reader.consume().unwrap();
//! reader.finish(&expected).unwrap();
//! ```

use std::fs::File;
use std::path::Path;

pub use self::error::{Result, VerifyError};
pub use self::hash::ContentHash;
pub use self::hasher::{Hasher, KeccakHasher};
pub use self::reader::VerifiedReader;

mod error;
mod hash;
mod hasher;
mod reader;

/// Hash the file at `path` and compare it with `expected`.
///
/// Blocking; async callers should run it on the blocking pool.
pub fn verify_file(expected: &ContentHash, path: impl AsRef<Path>) -> Result<()> {
    let file = File::open(path.as_ref())?;
    let mut reader = VerifiedReader::new(file, KeccakHasher::new());
    reader.consume()?;
    reader.finish(expected)
}

use std::io::{self, Read};

use crate::{ContentHash, Hasher, Result, VerifyError};

/// Streaming reader that hashes data as it passes through.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self { Self { reader, hasher } }
}

impl<R: Read, H: Hasher> VerifiedReader<R, H> {
    /// Drain the inner reader, hashing every byte.
    pub fn consume(&mut self) -> io::Result<u64> {
        let mut buf = vec![0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            total += n as u64;
        }
    }

    pub fn digest(self) -> ContentHash { ContentHash::from_digest(self.hasher.finalize()) }

    /// Compare the accumulated digest against `expected`.
    pub fn finish(self, expected: &ContentHash) -> Result<()> {
        let actual = self.digest();
        if &actual == expected {
            Ok(())
        } else {
            Err(VerifyError::HashMismatch {
                expected: expected.to_string(),
                actual:   actual.to_string(),
            })
        }
    }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

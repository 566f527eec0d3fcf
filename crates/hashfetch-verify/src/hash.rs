use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VerifyError};

/// Hex digest naming a cached file or directory.
///
/// Always stored as 64 lowercase hex characters without a `0x` prefix, which
/// makes it safe to use directly as a path component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);

        if trimmed.len() != 64 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(VerifyError::InvalidHash(input.to_string()));
        }

        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn from_digest(digest: [u8; 32]) -> Self { Self(hex::encode(digest)) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // Infallible: the constructor guarantees 64 hex characters.
        let _ = hex::decode_to_slice(&self.0, &mut out);
        out
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for ContentHash {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str { &self.0 }
}

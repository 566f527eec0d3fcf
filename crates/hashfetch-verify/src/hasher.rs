use sha3::{Digest, Keccak256};

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> [u8; 32];
}

/// Keccak-256, the `sha3` of the registry ecosystem (not FIPS SHA3-256).
pub struct KeccakHasher(Keccak256);

impl Hasher for KeccakHasher {
    fn update(&mut self, data: &[u8]) { Digest::update(&mut self.0, data); }
    fn finalize(self) -> [u8; 32] { to_array(&self.0.finalize()) }
}

impl Default for KeccakHasher {
    fn default() -> Self { Self::new() }
}

impl KeccakHasher {
    pub fn new() -> Self { Self(Keccak256::new()) }

    pub fn digest(data: &[u8]) -> [u8; 32] { to_array(&Keccak256::digest(data)) }
}

fn to_array(digest: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest);
    out
}

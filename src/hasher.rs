use crate::error::Error;
use md5::{Digest, Md5};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Read block size for streaming hashes (1 MiB).
pub const HASH_READ_BLOCK_SIZE: usize = 1024 * 1024;

/// Digest used as the catalog's content identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// Library Genesis catalogs are keyed by MD5.
    #[default]
    Md5,
    Blake3,
}

impl HashAlgorithm {
    /// Length of the lowercase hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Blake3 => 64,
        }
    }

    /// True when `value` looks like a digest of this algorithm.
    pub fn is_valid_hex(&self, value: &str) -> bool {
        value.len() == self.hex_len()
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(Error::UnknownHashAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => f.write_str("md5"),
            HashAlgorithm::Blake3 => f.write_str("blake3"),
        }
    }
}

/// Computes the content hash of a file as lowercase hex.
///
/// Implementations must be shareable across the hashing pool.
pub trait ContentHasher: Send + Sync {
    fn hash_file(&self, path: &Path) -> io::Result<String>;
}

/// Hashes file content incrementally through a fixed-size buffer.
#[derive(Debug, Clone, Copy)]
pub struct StreamHasher {
    algorithm: HashAlgorithm,
}

impl StreamHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl ContentHasher for StreamHasher {
    fn hash_file(&self, path: &Path) -> io::Result<String> {
        let file = File::open(path)?;
        match self.algorithm {
            HashAlgorithm::Md5 => {
                let mut hasher = Md5::new();
                stream_blocks(file, |block| hasher.update(block))?;
                Ok(format!("{:x}", hasher.finalize()))
            }
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                stream_blocks(file, |block| {
                    hasher.update(block);
                })?;
                Ok(hasher.finalize().to_hex().to_string())
            }
        }
    }
}

fn stream_blocks<R: Read>(mut reader: R, mut consume: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buffer = vec![0u8; HASH_READ_BLOCK_SIZE];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => consume(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// One-shot digest of an in-memory buffer, mostly for building catalogs in tests.
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Md5 => format!("{:x}", Md5::digest(data)),
        HashAlgorithm::Blake3 => blake3::hash(data).to_hex().to_string(),
    }
}

//! SHA-256 content verification.
//!
//! Validates downloaded layer blobs against the digests listed in the
//! manifest, either from a staged file or while the blob streams past.

use std::fmt::Write as _;
use std::io::{self, Read};
use std::path::Path;

use hatch_common::error::{HatchError, Result};
use hatch_common::types::Digest;
use sha2::{Digest as _, Sha256};

/// Computes the SHA-256 digest of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<Digest> {
    tracing::debug!(path = %path.display(), "computing SHA-256 hash");
    let mut file = std::fs::File::open(path).map_err(|e| HatchError::io(path, e))?;
    let mut hasher = Sha256::new();
    let _ = io::copy(&mut file, &mut hasher).map_err(|e| HatchError::io(path, e))?;
    Digest::from_hex(to_hex(&hasher.finalize()))
}

/// Validates that a file matches the expected digest.
///
/// # Errors
///
/// Returns `HatchError::HashMismatch` if the digests differ.
pub fn validate_hash(path: &Path, expected: &Digest) -> Result<()> {
    tracing::debug!(path = %path.display(), expected = %expected, "validating SHA-256 hash");
    let actual = hash_file(path)?;
    check(&path.display().to_string(), expected, &actual)
}

/// Read adapter that hashes everything passing through it.
#[derive(Debug)]
pub struct DigestReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
}

impl<R: Read> DigestReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    /// Returns the number of bytes read so far.
    pub const fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Drains the rest of the stream and compares the digest of everything
    /// read against `expected`.
    ///
    /// # Errors
    ///
    /// Returns `HatchError::HashMismatch` on a different digest, or an I/O
    /// error if draining fails.
    pub fn finish(mut self, resource: &str, expected: &Digest) -> Result<u64> {
        let _ = io::copy(&mut self, &mut io::sink()).map_err(|e| HatchError::io(resource, e))?;
        let actual = Digest::from_hex(to_hex(&self.hasher.finalize()))?;
        check(resource, expected, &actual)?;
        Ok(self.bytes)
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

fn check(resource: &str, expected: &Digest, actual: &Digest) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(HatchError::HashMismatch {
            resource: resource.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn hello_digest() -> Digest {
        Digest::from_hex(HELLO_SHA).expect("digest")
    }

    #[test]
    fn hash_file_matches_known_vector() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blob");
        std::fs::write(&path, "hello").expect("write");
        assert_eq!(hash_file(&path).expect("hash"), hello_digest());
        validate_hash(&path, &hello_digest()).expect("valid");
    }

    #[test]
    fn validate_hash_reports_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blob");
        std::fs::write(&path, "hello!").expect("write");
        let err = validate_hash(&path, &hello_digest()).unwrap_err();
        assert!(matches!(err, HatchError::HashMismatch { .. }));
    }

    #[test]
    fn digest_reader_hashes_partially_read_streams() {
        let mut reader = DigestReader::new(&b"hello"[..]);
        let mut first = [0_u8; 2];
        reader.read_exact(&mut first).expect("read");
        assert_eq!(reader.bytes_read(), 2);
        let total = reader.finish("blob", &hello_digest()).expect("finish");
        assert_eq!(total, 5);
    }

    #[test]
    fn digest_reader_detects_tampering() {
        let reader = DigestReader::new(&b"jello"[..]);
        assert!(reader.finish("blob", &hello_digest()).is_err());
    }
}

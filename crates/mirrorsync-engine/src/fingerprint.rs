//! Streaming content fingerprints
//!
//! A [`Fingerprint`] is the SHA-256 digest of a file's byte content. Two
//! files are content-equal iff their fingerprints are bit-equal. The digest
//! is computed by streaming fixed-size chunks through the hasher, so memory
//! use is bounded by the chunk size regardless of file size.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

/// A SHA-256 content digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// The raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Computes the fingerprint of the file at `path`, reading `chunk_size`
/// bytes per step.
///
/// The result is a pure function of the file's content: identical bytes
/// produce an identical fingerprint regardless of how the read is chunked.
///
/// # Errors
/// Returns the underlying I/O error if the file cannot be opened or a
/// read fails.
pub async fn fingerprint_file(path: &Path, chunk_size: usize) -> std::io::Result<Fingerprint> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(Fingerprint(hasher.finalize().into()))
}

// ============================================================================
// Unit tests
// ============================================================================

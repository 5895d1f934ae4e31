//! SHA-256 checksums over backup artifacts.
//!
//! The file is streamed in fixed-size chunks, so the digest matches hashing
//! the whole file at once without holding it in memory.

use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Read buffer size for streaming (64KB)
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
pub async fn compute_checksum(path: &Path) -> io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of an in-memory buffer.
pub fn checksum_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

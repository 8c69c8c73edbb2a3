//! Content hashing for duplicate detection

use ripemd::{Digest, Ripemd160};
use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 64 * 1024;

/// RIPEMD-160 of everything `reader` yields, as uppercase hex.
///
/// Consumes the reader from its current position to EOF; callers pass a
/// freshly opened handle.
pub async fn hash_reader<R>(mut reader: R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Ripemd160::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode_upper(hasher.finalize()))
}

/// RIPEMD-160 of an in-memory buffer, as uppercase hex.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode_upper(Ripemd160::digest(data))
}

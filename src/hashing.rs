use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Compute the blake3 hash of a file, streaming in chunks.
///
/// Used to tell genuine subtitle edits apart from no-op saves and from
/// our own relocation of the file.
pub fn hash_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut file = File::open(path.as_ref())?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

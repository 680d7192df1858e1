use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::cli::HashMethod;

impl HashMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashMethod::Full => "full",
            HashMethod::Partial => "partial",
        }
    }
}

/// SHA-256 of the file. `Partial` hashes only the first and last `chunk_size`
/// bytes of files larger than two chunks.
pub fn hash_file(p: &Path, method: HashMethod, chunk_size: u64) -> Result<String> {
    if method == HashMethod::Partial && chunk_size == 0 {
        bail!("partial hashing needs a chunk size above zero");
    }
    let mut file = File::open(p).with_context(|| format!("could not open file: {p:?}"))?;
    let size = file.metadata()?.len();

    let mut hasher = Sha256::new();
    if method == HashMethod::Full || size <= chunk_size.saturating_mul(2) {
        std::io::copy(&mut file, &mut hasher).with_context(|| format!("could not hash file: {p:?}"))?;
        return Ok(format!("{:x}", hasher.finalize()));
    }

    let mut chunk = Vec::new();
    hasher.update(b"FIRST");
    (&mut file).take(chunk_size).read_to_end(&mut chunk)?;
    hasher.update(&chunk);

    chunk.clear();
    file.seek(SeekFrom::Start(size - chunk_size))?;
    hasher.update(b"LAST");
    (&mut file).take(chunk_size).read_to_end(&mut chunk)?;
    hasher.update(&chunk);

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_small_file_partial_equals_full() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.bin");
        fs::write(&path, b"hello world").unwrap();

        let full = hash_file(&path, HashMethod::Full, 4).unwrap();
        assert_eq!(hash_file(&path, HashMethod::Partial, 64).unwrap(), full);
        assert_eq!(
            full,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_partial_ignores_middle_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.bin");
        let b = temp_dir.path().join("b.bin");
        fs::write(&a, b"headXXXXXXXXtail").unwrap();
        fs::write(&b, b"headYYYYYYYYtail").unwrap();

        assert_eq!(
            hash_file(&a, HashMethod::Partial, 4).unwrap(),
            hash_file(&b, HashMethod::Partial, 4).unwrap()
        );
        assert_ne!(
            hash_file(&a, HashMethod::Full, 4).unwrap(),
            hash_file(&b, HashMethod::Full, 4).unwrap()
        );
    }

    #[test]
    fn test_partial_rejects_zero_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.bin");
        fs::write(&path, b"hello world").unwrap();

        assert!(hash_file(&path, HashMethod::Partial, 0).is_err());
        assert!(hash_file(&path, HashMethod::Full, 0).is_ok());
    }
}

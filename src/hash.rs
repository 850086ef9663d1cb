//! Content digests used by folder comparison.

use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use crate::errors::{FsError, Op, Result};

const BUF_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        })
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            other => Err(format!("unsupported hash algorithm: '{other}'")),
        }
    }
}

/// Lowercase hex digest of the file at `path`.
pub fn digest(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    match algorithm {
        HashAlgorithm::Sha256 => stream::<Sha256>(path),
        HashAlgorithm::Sha512 => stream::<Sha512>(path),
    }
}

fn stream<D: Digest>(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(FsError::with(Op::Hash, path))?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    let mut hasher = D::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(FsError::with(Op::Hash, path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sha256_of_known_input() {
        let td = tempdir().unwrap();
        let p = td.path().join("abc.txt");
        std::fs::write(&p, b"abc").unwrap();
        assert_eq!(
            digest(&p, HashAlgorithm::Sha256).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest(&p, HashAlgorithm::Sha512).unwrap().len(), 128);
    }

    #[test]
    fn missing_file_is_not_found() {
        let td = tempdir().unwrap();
        let err = digest(&td.path().join("nope"), HashAlgorithm::Sha256).unwrap_err();
        assert!(matches!(err, FsError::NotFound { op: Op::Hash, .. }));
    }
}

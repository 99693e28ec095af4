//! Reads the raw symmetric key file shared by the controller and peer.

use crate::crypto::KEY_LEN;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("failed to open key file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read key file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("key file {path} is {got} bytes, need at least {KEY_LEN}")]
    TooShort { path: String, got: usize },
}

/// Read exactly `KEY_LEN` bytes of key material from `path`. A file shorter
/// than `KEY_LEN` is a fatal error; trailing bytes beyond `KEY_LEN` are
/// ignored (e.g. a trailing newline left by a text editor).
pub fn read_key(path: &Path) -> Result<[u8; KEY_LEN], KeyFileError> {
    let mut file = std::fs::File::open(path).map_err(|source| KeyFileError::Open {
        path: path.display().to_string(),
        source,
    })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|source| KeyFileError::Read {
        path: path.display().to_string(),
        source,
    })?;

    if buf.len() < KEY_LEN {
        return Err(KeyFileError::TooShort {
            path: path.display().to_string(),
            got: buf.len(),
        });
    }

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&buf[..KEY_LEN]);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_exact_length_key() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("swkvm-keyfile-test-{}", std::process::id()));
        std::fs::File::create(&path).unwrap().write_all(&[7u8; KEY_LEN]).unwrap();
        let key = read_key(&path).unwrap();
        assert_eq!(key, [7u8; KEY_LEN]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn ignores_trailing_bytes() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("swkvm-keyfile-test-trailing-{}", std::process::id()));
        let mut contents = vec![9u8; KEY_LEN];
        contents.push(b'\n');
        std::fs::File::create(&path).unwrap().write_all(&contents).unwrap();
        let key = read_key(&path).unwrap();
        assert_eq!(key, [9u8; KEY_LEN]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn rejects_short_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("swkvm-keyfile-test-short-{}", std::process::id()));
        std::fs::File::create(&path).unwrap().write_all(&[1u8; 10]).unwrap();
        let err = read_key(&path).unwrap_err();
        assert!(matches!(err, KeyFileError::TooShort { got: 10, .. }));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = Path::new("/nonexistent/swkvm-key-does-not-exist");
        assert!(matches!(read_key(path), Err(KeyFileError::Open { .. })));
    }
}

//! Base64 text artifacts
//!
//! Each artifact is the base64 text of a DER structure, wrapped at
//! [`params::BASE64_LINE_WIDTH`] columns with a trailing newline:
//! ```text
//! MIIEvQIBADANBgkqhkiG9w0BAQEFAASCBKcwggSjAgEAAoIBAQC...  (76 columns)
//! ...
//! ```

use crate::params;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Encode DER bytes as wrapped base64 text
pub fn encode(der: &[u8]) -> String {
    let encoded = BASE64_STANDARD.encode(der);
    let mut text = String::with_capacity(encoded.len() + encoded.len() / params::BASE64_LINE_WIDTH + 1);
    for line in encoded.as_bytes().chunks(params::BASE64_LINE_WIDTH) {
        // base64 output is ASCII, so every chunk boundary is a char boundary
        text.push_str(&String::from_utf8_lossy(line));
        text.push('\n');
    }
    text
}

/// Decode wrapped base64 text, ignoring line breaks and other whitespace
pub fn decode(text: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64_STANDARD.decode(compact)
}

/// Decode a private key artifact, falling back to the raw bytes for files
/// written before keys were stored as base64
pub fn decode_private_key(bytes: &[u8]) -> Vec<u8> {
    decode(bytes).unwrap_or_else(|_| bytes.to_vec())
}

/// Read an artifact, `None` if it does not exist
pub fn read(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write DER bytes as a base64 artifact, replacing any previous file atomically
pub fn write(path: &Path, der: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(encode(der).as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

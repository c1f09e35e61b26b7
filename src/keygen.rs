//! Random object keys
//!
//! Keys are 32 bytes from the OS random source, base64url encoded with the
//! padding stripped, so they are safe to use as object-storage paths and in
//! URLs without further escaping.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

const KEY_BYTES: usize = 32;

/// Generate a 43 character URL-safe random key.
pub fn generate_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a key truncated to at most `len` characters.
///
/// A length of zero means no truncation, so the result is never empty.
pub fn generate_key_with_len(len: usize) -> String {
    let mut key = generate_key();
    if len > 0 && len < key.len() {
        key.truncate(len);
    }
    key
}

/// Extension of a file name, without the dot.
pub fn file_extension(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Random key for an uploaded file, keeping the file's extension.
pub fn object_key(prefix: Option<&str>, file_name: &str) -> String {
    let mut key = String::from(prefix.unwrap_or_default());
    key.push_str(&generate_key());
    if let Some(ext) = file_extension(file_name) {
        key.push('.');
        key.push_str(ext);
    }
    key
}

/// Random key for a job output.
pub fn output_key(prefix: Option<&str>, extension: Option<&str>) -> String {
    let mut key = String::from(prefix.unwrap_or_default());
    key.push_str(&generate_key());
    if let Some(ext) = extension {
        key.push('.');
        key.push_str(ext.trim_start_matches('.'));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_url_safe(key: &str) {
        assert!(!key.is_empty());
        assert!(!key.contains('+'), "key contains '+': {}", key);
        assert!(!key.contains('/'), "key contains '/': {}", key);
        assert!(!key.ends_with('='), "key is padded: {}", key);
    }

    #[test]
    fn test_generate_key_is_url_safe() {
        for _ in 0..500 {
            let key = generate_key();
            assert_eq!(key.len(), 43);
            assert_url_safe(&key);
        }
    }

    #[test]
    fn test_keys_differ() {
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn test_truncation() {
        assert_eq!(generate_key_with_len(16).len(), 16);
        assert_eq!(generate_key_with_len(0).len(), 43);
        assert_eq!(generate_key_with_len(100).len(), 43);
        assert_url_safe(&generate_key_with_len(1));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.png"), Some("png"));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".bashrc"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_object_key_keeps_extension() {
        let key = object_key(None, "face.jpg");
        assert!(key.ends_with(".jpg"));
        assert_eq!(key.len(), 43 + 4);

        let reference = object_key(Some("reference_"), "voice.wav");
        assert!(reference.starts_with("reference_"));
        assert!(reference.ends_with(".wav"));

        let bare = object_key(None, "noext");
        assert_eq!(bare.len(), 43);
    }

    #[test]
    fn test_output_key() {
        assert!(output_key(None, Some("mp4")).ends_with(".mp4"));
        assert!(output_key(None, Some(".mp4")).ends_with(".mp4"));
        assert!(!output_key(None, Some(".mp4")).contains(".."));
        let speech = output_key(Some("output_"), Some("wav"));
        assert!(speech.starts_with("output_"));
        assert_url_safe(&output_key(None, None));
    }
}

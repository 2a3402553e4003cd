//! Compiled regex patterns for parsing git-annex output.
//!
//! Compiled once on first use.
//! Update these when the annex key format grows new fields.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Annex Keys
// ═══════════════════════════════════════════════════════════════════════════════

/// `BACKEND[-sSIZE][-mMTIME][-SCHUNKSIZE-CCHUNK]--NAME`, capturing SIZE.
pub static RE_ANNEX_KEY_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+(?:-[a-zA-Z]\d+)*?-s(\d+)(?:-[a-zA-Z]\d+)*--").unwrap());

/// Byte size recorded in an annex key, if the backend stores one.
pub fn annex_key_size(key: &str) -> Option<u64> {
    RE_ANNEX_KEY_SIZE
        .captures(key)
        .and_then(|cap| cap.get(1))
        .and_then(|size| size.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_from_hashing_backend() {
        assert_eq!(
            annex_key_size("SHA256E-s5--3fb9ec1c6a0a2f7f.txt"),
            Some(5)
        );
        assert_eq!(annex_key_size("MD5-s1024--d41d8cd98f00b204"), Some(1024));
    }

    #[test]
    fn test_size_with_mtime_and_chunk_fields() {
        assert_eq!(annex_key_size("WORM-s42-m1443625512--file.dat"), Some(42));
        assert_eq!(
            annex_key_size("SHA256E-s1048576-S262144-C2--abcd.bin"),
            Some(1_048_576)
        );
    }

    #[test]
    fn test_keys_without_size() {
        assert_eq!(annex_key_size("URL--http&c%%example.com%file"), None);
        assert_eq!(annex_key_size("not a key"), None);
        assert_eq!(annex_key_size(""), None);
    }
}

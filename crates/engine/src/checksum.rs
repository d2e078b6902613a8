//! Script content checksums.
//!
//! The checksum identifies a script revision and detects changes between runs.
//! It is the lowercase hex SHA-256 digest of the raw bytes, with no
//! normalization of line endings or encoding.

use sha2::{Digest, Sha256};

/// Computes the checksum of raw script content.
///
/// ```rust
/// use flowrun_engine::checksum::script_checksum;
///
/// let checksum = script_checksum(b"println 'Hello world'");
/// assert_eq!(checksum.len(), 64);
/// assert_eq!(checksum, script_checksum(b"println 'Hello world'"));
/// ```
pub fn script_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_has_well_known_digest() {
        assert_eq!(
            script_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn checksum_changes_with_content() {
        let original = script_checksum(b"println 'Hello world'");
        let edited = script_checksum(b"println 'Hello world!'");

        assert_ne!(original, edited);
        assert!(original.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn line_endings_are_not_normalized() {
        assert_ne!(script_checksum(b"a\nb"), script_checksum(b"a\r\nb"));
    }
}

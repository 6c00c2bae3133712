//! Content hashing for implementation identity.
//!
//! A stage emits a function definition once per hash, so implementations
//! with the same identity (the same source text, or the same generated
//! helper) share one definition. Shader fingerprints use the same digest.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 digest identifying an emitted function or a generated shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Digest of raw text, such as a library source file.
    pub fn of_text(text: &str) -> Self {
        Self(Sha256::digest(text.as_bytes()).into())
    }

    /// Digest of a serializable identity, hashed through its JSON form.
    pub fn of<T: Serialize>(value: &T) -> Self {
        let json = serde_json::to_vec(value).unwrap_or_default();
        Self(Sha256::digest(&json).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The first eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Digest of a serializable identity.
pub fn content_hash<T: Serialize>(value: &T) -> ContentHash {
    ContentHash::of(value)
}

/// Lowercase hex form of a digest.
pub fn hash_hex(hash: &ContentHash) -> String {
    hash.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_hash_deterministically() {
        let a = content_hash(&("IM_add_float", "mx_add_float"));
        let b = content_hash(&("IM_add_float", "mx_add_float"));
        assert_eq!(a, b);
        assert_ne!(a, content_hash(&("IM_add_color3", "mx_add_color3")));
    }

    #[test]
    fn text_hash_ignores_file_identity() {
        let source = "void mx_a(out float r) { r = 1.0; }\n";
        assert_eq!(ContentHash::of_text(source), ContentHash::of_text(&source.to_string()));
        assert_ne!(ContentHash::of_text(source), ContentHash::of_text("void mx_b() {}"));
    }

    #[test]
    fn hex_forms() {
        let hash = content_hash(&42u32);
        let hex = hash_hex(&hash);
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with(&hash.short()));
        assert_eq!(hash.short().len(), 8);
    }
}

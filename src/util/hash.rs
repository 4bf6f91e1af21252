//! Hashing utilities for action fingerprints.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute SHA256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// A hasher for building fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add multiple strings to the fingerprint.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Add a path, normalized to forward slashes.
    pub fn update_path(&mut self, path: &Path) -> &mut Self {
        let normalized = path.to_string_lossy().replace('\\', "/");
        self.update_str(&normalized)
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize and return a short fingerprint (first 16 chars).
    pub fn finish_short(self) -> String {
        self.finish()[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_str() {
        let hash = sha256_str("hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_fingerprint_separates_components() {
        let joined = {
            let mut fp = Fingerprint::new();
            fp.update_str("ab").update_str("c");
            fp.finish()
        };
        let split = {
            let mut fp = Fingerprint::new();
            fp.update_str("a").update_str("bc");
            fp.finish()
        };

        assert_ne!(joined, split);
    }

    #[test]
    fn test_path_separators_are_normalized() {
        let a = {
            let mut fp = Fingerprint::new();
            fp.update_path(Path::new("Engine\\Source\\Core.cpp"));
            fp.finish_short()
        };
        let b = {
            let mut fp = Fingerprint::new();
            fp.update_path(Path::new("Engine/Source/Core.cpp"));
            fp.finish_short()
        };

        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}

//! Chunk fingerprinting.

use sha2::{Digest, Sha256};

/// Calculate SHA-256 hash of text.
pub fn calculate_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_hash() {
        let hash = calculate_hash("The roof was replaced in 2020.");
        assert_eq!(hash.len(), 64); // SHA-256 produces 64 hex chars
        assert_eq!(hash, calculate_hash("The roof was replaced in 2020."));
        assert_ne!(hash, calculate_hash("The roof was replaced in 2021."));
    }
}

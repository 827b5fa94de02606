//! Short tenant identifiers
//!
//! Tokens are 8 lowercase alphanumerics taken from a shuffled SHA-256 digest
//! of the wall clock, a random salt and a nanosecond reading. Uniqueness is
//! checked by the caller against the uuids that already exist.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

pub const UUID_LENGTH: usize = 8;

pub struct IdentifierGenerator;

impl IdentifierGenerator {
    /// Produce one candidate token. Not guaranteed unique on its own.
    pub fn generate() -> String {
        let mut rng = rand::thread_rng();
        let mut pool: Vec<char> = Vec::with_capacity(64);

        while pool.len() < UUID_LENGTH {
            let now = Utc::now();
            let salt: u128 = rng.gen();

            let mut hasher = Sha256::new();
            hasher.update(now.timestamp().to_be_bytes());
            hasher.update(salt.to_be_bytes());
            hasher.update(now.timestamp_subsec_nanos().to_be_bytes());
            let digest = hasher.finalize();

            pool.extend(
                STANDARD
                    .encode(digest)
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric()),
            );
        }

        pool.shuffle(&mut rng);
        pool.into_iter()
            .take(UUID_LENGTH)
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    /// Keep generating until the token is not in `existing`.
    pub fn generate_unique(existing: &HashSet<String>) -> String {
        loop {
            let candidate = Self::generate();
            if !existing.contains(&candidate) {
                return candidate;
            }
            tracing::debug!("Tenant uuid collision on {}, regenerating", candidate);
        }
    }

    pub fn is_valid(token: &str) -> bool {
        token.len() == UUID_LENGTH
            && token
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        for _ in 0..500 {
            let token = IdentifierGenerator::generate();
            assert!(IdentifierGenerator::is_valid(&token), "bad token {}", token);
        }
    }

    #[test]
    fn test_generate_unique_avoids_existing() {
        let mut existing = HashSet::new();
        for _ in 0..200 {
            let token = IdentifierGenerator::generate_unique(&existing);
            assert!(!existing.contains(&token));
            existing.insert(token);
        }
        assert_eq!(existing.len(), 200);
    }

    #[test]
    fn test_is_valid() {
        assert!(IdentifierGenerator::is_valid("ab12cd34"));
        assert!(!IdentifierGenerator::is_valid("AB12CD34"));
        assert!(!IdentifierGenerator::is_valid("ab12cd3"));
        assert!(!IdentifierGenerator::is_valid("ab12-d34"));
    }
}

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const SCHEME: &str = "pbkdf2_sha256";

#[derive(thiserror::Error, Debug)]
pub enum PasswordError {
    #[error("Failed to generate salt")]
    Salt,

    #[error("Iteration count must be positive")]
    InvalidIterations,
}

/// One-way hashing for the optional login password stored on audit rows.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, PasswordError>;
    fn verify(&self, secret: &str, encoded: &str) -> bool;
}

/// PBKDF2-HMAC-SHA256 with a random salt per hash.
///
/// Encoded as `pbkdf2_sha256$<iterations>$<hex salt>$<hex hash>`.
pub struct Pbkdf2Hasher {
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl Pbkdf2Hasher {
    pub fn new(iterations: u32) -> Result<Self, PasswordError> {
        Ok(Self {
            iterations: NonZeroU32::new(iterations).ok_or(PasswordError::InvalidIterations)?,
            rng: SystemRandom::new(),
        })
    }
}

impl SecretHasher for Pbkdf2Hasher {
    fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        let mut salt = [0u8; SALT_LEN];
        self.rng.fill(&mut salt).map_err(|_| PasswordError::Salt)?;

        let mut out = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            secret.as_bytes(),
            &mut out,
        );

        Ok(format!(
            "{}${}${}${}",
            SCHEME,
            self.iterations,
            hex::encode(salt),
            hex::encode(out)
        ))
    }

    fn verify(&self, secret: &str, encoded: &str) -> bool {
        let parts: Vec<&str> = encoded.split('$').collect();
        let [scheme, iterations, salt, hash] = parts.as_slice() else {
            return false;
        };
        if *scheme != SCHEME {
            return false;
        }

        let (Some(iterations), Ok(salt), Ok(hash)) = (
            iterations.parse::<u32>().ok().and_then(NonZeroU32::new),
            hex::decode(salt),
            hex::decode(hash),
        ) else {
            return false;
        };

        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            secret.as_bytes(),
            &hash,
        )
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies_and_hides_secret() {
        let hasher = Pbkdf2Hasher::new(1_000).unwrap();
        let encoded = hasher.hash("senha123").unwrap();

        assert!(encoded.starts_with("pbkdf2_sha256$1000$"));
        assert!(!encoded.contains("senha123"));
        assert!(hasher.verify("senha123", &encoded));
        assert!(!hasher.verify("senha124", &encoded));
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = Pbkdf2Hasher::new(1_000).unwrap();

        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = Pbkdf2Hasher::new(1_000).unwrap();

        assert!(!hasher.verify("x", "plain-text"));
        assert!(!hasher.verify("x", "bcrypt$10$aa$bb"));
        assert!(!hasher.verify("x", "pbkdf2_sha256$0$aa$bb"));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(matches!(
            Pbkdf2Hasher::new(0),
            Err(PasswordError::InvalidIterations)
        ));
    }
}

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

#[derive(thiserror::Error, Debug)]
pub enum EncryptionError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid encrypted data format")]
    InvalidFormat,
}

/// Produces the opaque `signature` header that ties a response to its audit row.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request_id: i64) -> Result<String, EncryptionError>;

    /// Recovers the request id from a signature produced by `sign`.
    fn open(&self, signature: &str) -> Result<i64, EncryptionError>;
}

/// AES-256-GCM over the decimal request id, base64 encoded.
///
/// Format before encoding: [nonce (12 bytes)][ciphertext + auth tag]
pub struct AesGcmSigner {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmSigner {
    pub fn new(key: &[u8; 32]) -> Result<Self, EncryptionError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| EncryptionError::EncryptionFailed("Invalid AES key".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Builds a signer from the application key string.
    pub fn from_app_key(app_key: &str) -> Result<Self, EncryptionError> {
        Self::new(&derive_key(app_key))
    }
}

impl RequestSigner for AesGcmSigner {
    fn sign(&self, request_id: i64) -> Result<String, EncryptionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| EncryptionError::EncryptionFailed("Failed to generate nonce".to_string()))?;

        let mut in_out = request_id.to_string().into_bytes();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| EncryptionError::EncryptionFailed("Sealing failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);

        Ok(STANDARD.encode(sealed))
    }

    fn open(&self, signature: &str) -> Result<i64, EncryptionError> {
        let sealed = STANDARD
            .decode(signature)
            .map_err(|_| EncryptionError::InvalidFormat)?;
        if sealed.len() < NONCE_LEN {
            return Err(EncryptionError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| EncryptionError::InvalidFormat)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| EncryptionError::DecryptionFailed("Opening failed".to_string()))?;

        std::str::from_utf8(plaintext)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| EncryptionError::DecryptionFailed("Not a request id".to_string()))
    }
}

/// Derives a 32-byte key from an arbitrary string with SHA-256.
pub fn derive_key(key_string: &str) -> [u8; 32] {
    let hash = digest::digest(&digest::SHA256, key_string.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(hash.as_ref());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_opens_to_request_id() {
        let signer = AesGcmSigner::from_app_key("base64:test-app-key").unwrap();

        let signature = signer.sign(1234).unwrap();
        assert_eq!(signer.open(&signature).unwrap(), 1234);
    }

    #[test]
    fn test_signatures_differ_for_same_id() {
        let signer = AesGcmSigner::from_app_key("base64:test-app-key").unwrap();

        let first = signer.sign(7).unwrap();
        let second = signer.sign(7).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_other_key_cannot_open() {
        let signer = AesGcmSigner::from_app_key("key-one").unwrap();
        let other = AesGcmSigner::from_app_key("key-two").unwrap();

        let signature = signer.sign(99).unwrap();
        assert!(matches!(
            other.open(&signature),
            Err(EncryptionError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_garbage_signature_is_invalid_format() {
        let signer = AesGcmSigner::from_app_key("key").unwrap();

        assert!(matches!(
            signer.open("not base64!"),
            Err(EncryptionError::InvalidFormat)
        ));
        assert!(matches!(
            signer.open(&STANDARD.encode([1u8; 4])),
            Err(EncryptionError::InvalidFormat)
        ));
    }
}

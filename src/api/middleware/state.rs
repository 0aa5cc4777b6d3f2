use secrecy::ExposeSecret;
use std::sync::Arc;

use crate::config::Config;
use crate::db::CnhStore;
use crate::services::{
    password::{PasswordError, Pbkdf2Hasher, SecretHasher},
    signature::{AesGcmSigner, EncryptionError, RequestSigner},
};

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CnhStore>,
    pub config: Config,
    pub signer: Arc<dyn RequestSigner>,
    pub hasher: Arc<dyn SecretHasher>,
}

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Signer(#[from] EncryptionError),

    #[error(transparent)]
    Hasher(#[from] PasswordError),
}

impl AppState {
    /// Builds the state with the default crypto primitives derived from `config`.
    pub fn new(config: Config, store: Arc<dyn CnhStore>) -> Result<Self, StateError> {
        let signer = AesGcmSigner::from_app_key(config.app_key.expose_secret())?;
        let hasher = Pbkdf2Hasher::new(config.password_hash_iterations)?;

        Ok(Self {
            store,
            config,
            signer: Arc::new(signer),
            hasher: Arc::new(hasher),
        })
    }
}

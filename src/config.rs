use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use std::str::FromStr;

const DEFAULT_VALIDATION_PRICE: &str = "0.24";
const DEFAULT_PASSWORD_HASH_ITERATIONS: u32 = 100_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Absent means the in-memory store is used.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,

    // Security
    pub app_key: Secret<String>,
    pub password_hash_iterations: u32,

    // Audit defaults
    pub validation_price: Decimal,
    pub registration_client_name: String,
    pub validation_client_name: String,

    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let validation_price = config
            .get::<String>("validation_price")
            .unwrap_or_else(|_| DEFAULT_VALIDATION_PRICE.to_string());
        let validation_price = Decimal::from_str(&validation_price).map_err(|e| {
            config::ConfigError::Message(format!("invalid VALIDATION_PRICE: {}", e))
        })?;

        Ok(Self {
            database_url: config.get("database_url").ok(),
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port").unwrap_or(8000),

            app_key: Secret::new(config.get("app_key")?),
            password_hash_iterations: config
                .get("password_hash_iterations")
                .unwrap_or(DEFAULT_PASSWORD_HASH_ITERATIONS),

            validation_price: validation_price.round_dp(2),
            registration_client_name: config
                .get("registration_client_name")
                .unwrap_or_else(|_| "Sistema Cadastro".to_string()),
            validation_client_name: config
                .get("validation_client_name")
                .unwrap_or_else(|_| "Minha Empresa".to_string()),

            seed_demo_data: config.get("seed_demo_data").unwrap_or(false),
        })
    }

    /// Configuration with defaults and the given key, without touching the environment.
    pub fn with_app_key(app_key: impl Into<String>) -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".to_string(),
            port: 8000,
            app_key: Secret::new(app_key.into()),
            password_hash_iterations: DEFAULT_PASSWORD_HASH_ITERATIONS,
            validation_price: Decimal::new(24, 2),
            registration_client_name: "Sistema Cadastro".to_string(),
            validation_client_name: "Minha Empresa".to_string(),
            seed_demo_data: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_billing_rules() {
        let config = Config::with_app_key("key");

        assert!(config.database_url.is_none());
        assert_eq!(config.validation_price.to_string(), "0.24");
        assert_eq!(config.registration_client_name, "Sistema Cadastro");
        assert_eq!(config.validation_client_name, "Minha Empresa");
        assert!(!config.seed_demo_data);
    }
}

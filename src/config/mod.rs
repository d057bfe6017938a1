//! Configuration module for the showcase backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy product index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// HS256 secret shared with the identity provider
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim, if the identity provider sets one
    pub jwt_issuer: Option<String>,
    /// Stripe secret key
    pub stripe_secret_key: Option<String>,
    /// Stripe API base URL
    pub stripe_api_base: String,
    /// Currency for payment intents
    pub currency: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("SHOWCASE_DB_PATH")
            .unwrap_or_else(|_| "./data/showcase.sqlite".to_string())
            .into();

        let index_path = env::var("SHOWCASE_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr = env::var("SHOWCASE_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .expect("Invalid SHOWCASE_BIND_ADDR format");

        let log_level = env::var("SHOWCASE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = non_empty_var("SHOWCASE_JWT_SECRET");
        let jwt_issuer = non_empty_var("SHOWCASE_JWT_ISSUER");
        let stripe_secret_key = non_empty_var("STRIPE_SECRET_KEY");

        let stripe_api_base = env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| "https://api.stripe.com".to_string())
            .trim_end_matches('/')
            .to_string();

        let currency = env::var("SHOWCASE_CURRENCY")
            .unwrap_or_else(|_| "usd".to_string())
            .to_lowercase();

        Self {
            db_path,
            index_path,
            bind_addr,
            log_level,
            jwt_secret,
            jwt_issuer,
            stripe_secret_key,
            stripe_api_base,
            currency,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for key in [
            "SHOWCASE_DB_PATH",
            "SHOWCASE_INDEX_PATH",
            "SHOWCASE_BIND_ADDR",
            "SHOWCASE_LOG_LEVEL",
            "SHOWCASE_JWT_SECRET",
            "SHOWCASE_JWT_ISSUER",
            "STRIPE_SECRET_KEY",
            "STRIPE_API_BASE",
            "SHOWCASE_CURRENCY",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env();

        assert_eq!(config.db_path, PathBuf::from("./data/showcase.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.log_level, "info");
        assert!(config.jwt_secret.is_none());
        assert!(config.jwt_issuer.is_none());
        assert!(config.stripe_secret_key.is_none());
        assert_eq!(config.stripe_api_base, "https://api.stripe.com");
        assert_eq!(config.currency, "usd");
    }
}

//! Worker configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPIFY_SUBDOMAIN` - store subdomain (e.g. `my-store` for
//!   `my-store.myshopify.com`)
//! - `SHOPIFY_API_KEY` - Admin API key
//! - `SHOPIFY_APP_PASSWORD` - Admin API password (HIGH PRIVILEGE)
//! - `DATABASE_URL` - `PostgreSQL` connection string for the SKU index
//! - `REDIS_URL` - Redis connection string for the shared rate limiter
//!
//! ## Optional
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2024-01)
//! - `PRODUCT_TYPES_PATH` - type table CSV (default: configs/product-types.csv)
//! - `WORKER_BUDGET_SECS` - execution budget bounding throttle leases
//!   (default: 600)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_API_VERSION: &str = "2024-01";
const DEFAULT_TYPES_PATH: &str = "configs/product-types.csv";
const DEFAULT_WORKER_BUDGET_SECS: u64 = 600;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shopify Admin API credentials and endpoint.
    pub shopify: ShopifyConfig,
    /// `PostgreSQL` connection URL for the SKU index (contains password).
    pub database_url: SecretString,
    /// Redis connection URL for the shared throttle store.
    pub redis_url: String,
    /// Path to the merchandising type table CSV.
    pub types_path: PathBuf,
    /// Remaining execution budget of one worker invocation. Throttle
    /// leases never outlive this, so a stalled worker cannot pin the
    /// shared bucket past its own termination deadline.
    pub worker_budget: Duration,
}

/// Shopify Admin API configuration.
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Store subdomain under `myshopify.com`.
    pub subdomain: String,
    /// Admin API key (basic-auth username).
    pub api_key: String,
    /// Admin API password (basic-auth password, HIGH PRIVILEGE).
    pub app_password: SecretString,
    /// Admin API version segment.
    pub api_version: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a
    /// numeric variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let worker_budget_secs = match env::var("WORKER_BUDGET_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("WORKER_BUDGET_SECS".to_string(), e.to_string())
            })?,
            Err(_) => DEFAULT_WORKER_BUDGET_SECS,
        };

        Ok(Self {
            shopify: ShopifyConfig {
                subdomain: require("SHOPIFY_SUBDOMAIN")?,
                api_key: require("SHOPIFY_API_KEY")?,
                app_password: SecretString::from(require("SHOPIFY_APP_PASSWORD")?),
                api_version: env::var("SHOPIFY_API_VERSION")
                    .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            },
            database_url: SecretString::from(require("DATABASE_URL")?),
            redis_url: require("REDIS_URL")?,
            types_path: env::var("PRODUCT_TYPES_PATH")
                .map_or_else(|_| PathBuf::from(DEFAULT_TYPES_PATH), PathBuf::from),
            worker_budget: Duration::from_secs(worker_budget_secs),
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

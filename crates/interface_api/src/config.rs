//! API configuration

use serde::Deserialize;

use domain_claims::transfer::{DEFAULT_MAX_BYTES, DEFAULT_MAX_ROWS};
use domain_claims::ImportLimits;

/// API configuration
///
/// Every field can be set from an `API_`-prefixed environment variable,
/// e.g. `API_IMPORT_MAX_ROWS=1000`. Missing fields keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Largest accepted import file, in bytes
    pub import_max_bytes: usize,
    /// Largest accepted import file, in data rows
    pub import_max_rows: usize,
    /// Database pool size
    pub db_max_connections: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/claims".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            import_max_bytes: DEFAULT_MAX_BYTES,
            import_max_rows: DEFAULT_MAX_ROWS,
            db_max_connections: 10,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Import limits derived from the configuration
    pub fn import_limits(&self) -> ImportLimits {
        ImportLimits {
            max_bytes: self.import_max_bytes,
            max_rows: self.import_max_rows,
        }
    }

    /// Request body limit for the import endpoint
    ///
    /// Covers a claims file and a details file at the file limit plus the
    /// multipart framing.
    pub fn upload_body_limit(&self) -> usize {
        self.import_max_bytes
            .saturating_mul(2)
            .saturating_add(64 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.import_max_bytes, 50 * 1024 * 1024);
        assert_eq!(config.import_limits().max_rows, 50_000);
        assert!(!config.log_json);
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config: ApiConfig = config::Config::builder()
            .set_override("port", 9090)
            .unwrap()
            .set_override("log_json", true)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.port, 9090);
        assert!(config.log_json);
        assert_eq!(config.jwt_expiration_secs, 3600);
    }
}

//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::DEFAULT_IDEMPOTENCY_TTL_HOURS;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3002`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL URL; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `CUSTOMERS_API_URL`: customer service base URL (default: `"http://localhost:3001"`)
/// - `SERVICE_TOKEN`: bearer token for the customer service's internal endpoints
/// - `CUSTOMER_VALIDATION_TIMEOUT_MS`: customer call timeout (default: `3000`)
/// - `IDEMPOTENCY_TTL_HOURS`: lifetime of confirmation records (default: `24`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub customers_api_url: String,
    pub service_token: String,
    pub customer_validation_timeout: Duration,
    pub idempotency_ttl_hours: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            customers_api_url: lookup("CUSTOMERS_API_URL").unwrap_or(defaults.customers_api_url),
            service_token: lookup("SERVICE_TOKEN").unwrap_or(defaults.service_token),
            customer_validation_timeout: lookup("CUSTOMER_VALIDATION_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.customer_validation_timeout),
            idempotency_ttl_hours: lookup("IDEMPOTENCY_TTL_HOURS")
                .and_then(|h| h.parse().ok())
                .filter(|h: &i64| *h > 0)
                .unwrap_or(defaults.idempotency_ttl_hours),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Lifetime of confirmation idempotency records.
    pub fn idempotency_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.idempotency_ttl_hours)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            customers_api_url: "http://localhost:3001".to_string(),
            service_token: String::new(),
            customer_validation_timeout: Duration::from_millis(3000),
            idempotency_ttl_hours: DEFAULT_IDEMPOTENCY_TTL_HOURS,
        }
    }
}

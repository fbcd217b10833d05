use std::path::PathBuf;
use std::time::Duration;

/// Order engine configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/order-engine | Working directory for the ledger and logs |
/// | LEDGER_DB_FILE | ledger.redb | Ledger file name inside `WORK_DIR` |
/// | LOG_LEVEL | info | Log level filter |
/// | LOG_DIR | (unset) | Daily rolling log files go here when set |
/// | ENVIRONMENT | development | Runtime environment |
/// | PAYMENT_GATEWAY_TIMEOUT_MS | 10000 | Gateway confirmation timeout |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/orders LOG_LEVEL=debug cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory holding the ledger file
    pub work_dir: String,
    pub ledger_db_file: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// development | staging | production
    pub environment: String,
    pub payment_gateway_timeout_ms: u64,
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR")
                .unwrap_or_else(|_| "/var/lib/order-engine".into()),
            ledger_db_file: std::env::var("LEDGER_DB_FILE")
                .unwrap_or_else(|_| "ledger.redb".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            payment_gateway_timeout_ms: std::env::var("PAYMENT_GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
        }
    }

    /// Override the working directory, typically in tests
    pub fn with_overrides(work_dir: impl Into<String>, ledger_db_file: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.ledger_db_file = ledger_db_file.into();
        config
    }

    /// Full path of the ledger file
    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.ledger_db_file)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_gateway_timeout_ms)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_build_ledger_path() {
        let config = Config::with_overrides("/tmp/orders", "test.redb");
        assert_eq!(config.ledger_path(), PathBuf::from("/tmp/orders/test.redb"));
        assert!(config.gateway_timeout() > Duration::ZERO);
    }
}

use std::env;
use std::path::PathBuf;
use std::time::Duration;

// Common constants
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const DERIVATIVE_MAX_DIMENSION: u32 = 1024;
const DERIVATIVE_JPEG_QUALITY: u8 = 75;
const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;
const RETRY_FACTOR: f64 = 2.0;
const RETRY_JITTER: f64 = 0.2;

/// Retry policy for transient failures on remote backends.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    /// Fractional jitter applied to each delay (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            factor: RETRY_FACTOR,
            jitter: RETRY_JITTER,
        }
    }
}

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// Postgres connection string. When absent, storage targets come from
    /// `targets_file` and file records are kept in memory.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub targets_file: Option<PathBuf>,
    pub derivative_max_dimension: u32,
    pub derivative_jpeg_quality: u8,
    pub retry: RetryConfig,
    /// `pretty` or `json`
    pub log_format: String,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let retry = RetryConfig {
            max_attempts: env::var("STORAGE_RETRY_MAX_ATTEMPTS")
                .unwrap_or_else(|_| RETRY_MAX_ATTEMPTS.to_string())
                .parse()
                .unwrap_or(RETRY_MAX_ATTEMPTS),
            base_delay: Duration::from_millis(
                env::var("STORAGE_RETRY_BASE_DELAY_MS")
                    .unwrap_or_else(|_| RETRY_BASE_DELAY_MS.to_string())
                    .parse()
                    .unwrap_or(RETRY_BASE_DELAY_MS),
            ),
            factor: env::var("STORAGE_RETRY_FACTOR")
                .unwrap_or_else(|_| RETRY_FACTOR.to_string())
                .parse()
                .unwrap_or(RETRY_FACTOR),
            jitter: env::var("STORAGE_RETRY_JITTER")
                .unwrap_or_else(|_| RETRY_JITTER.to_string())
                .parse()
                .unwrap_or(RETRY_JITTER),
        };

        let config = Config {
            environment,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            targets_file: env::var("FILESTOW_TARGETS_FILE").ok().map(PathBuf::from),
            derivative_max_dimension: env::var("DERIVATIVE_MAX_DIMENSION")
                .unwrap_or_else(|_| DERIVATIVE_MAX_DIMENSION.to_string())
                .parse()
                .unwrap_or(DERIVATIVE_MAX_DIMENSION),
            derivative_jpeg_quality: env::var("DERIVATIVE_JPEG_QUALITY")
                .unwrap_or_else(|_| DERIVATIVE_JPEG_QUALITY.to_string())
                .parse()
                .unwrap_or(DERIVATIVE_JPEG_QUALITY),
            retry,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase(),
            log_filter: env::var("RUST_LOG").unwrap_or_else(|_| "filestow=info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database_url.is_none() && self.targets_file.is_none() && self.is_production() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL or FILESTOW_TARGETS_FILE must be set in production"
            ));
        }
        if self.derivative_max_dimension == 0 {
            return Err(anyhow::anyhow!("DERIVATIVE_MAX_DIMENSION must be greater than 0"));
        }
        if !(1..=100).contains(&self.derivative_jpeg_quality) {
            return Err(anyhow::anyhow!("DERIVATIVE_JPEG_QUALITY must be between 1 and 100"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow::anyhow!("STORAGE_RETRY_MAX_ATTEMPTS must be at least 1"));
        }
        if self.retry.factor < 1.0 {
            return Err(anyhow::anyhow!("STORAGE_RETRY_FACTOR must be >= 1.0"));
        }
        if !(0.0..1.0).contains(&self.retry.jitter) {
            return Err(anyhow::anyhow!("STORAGE_RETRY_JITTER must be in [0, 1)"));
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!("LOG_FORMAT must be 'pretty' or 'json'"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            targets_file: None,
            derivative_max_dimension: DERIVATIVE_MAX_DIMENSION,
            derivative_jpeg_quality: DERIVATIVE_JPEG_QUALITY,
            retry: RetryConfig::default(),
            log_format: "pretty".to_string(),
            log_filter: "filestow=info".to_string(),
        }
    }
}

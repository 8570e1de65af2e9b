use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "filestow=info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

fn build_filter(filter: &str) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    if filter.trim().is_empty() {
        EnvFilter::try_new(DEFAULT_FILTER)
    } else {
        EnvFilter::try_new(filter)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(
    format: LogFormat,
    filter: &str,
    environment: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(build_filter(filter)?)
        .with(pretty)
        .with(json)
        .try_init()?;

    tracing::info!(
        environment = %environment,
        format = ?format,
        "Tracing initialized"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_filter_parsing() {
        assert!(build_filter("  ").is_ok());
        assert!(build_filter("filestow=debug,sqlx=warn").is_ok());
        assert!(build_filter("filestow=loud").is_err());
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_telemetry(LogFormat::Pretty, "filestow=warn", "test");
        assert!(init_telemetry(LogFormat::Json, "filestow=warn", "test").is_err());
    }
}

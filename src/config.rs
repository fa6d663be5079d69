//! Configuration management

use std::path::PathBuf;

use anyhow::{self, Context, Result};

use crate::defaults::{DEFAULT_CONCURRENCY, DEFAULT_LEAD_API_URL};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// GraphQL endpoint of the CRM backend
    pub lead_api_url: String,

    /// Bearer token sent with every lead API request (optional)
    pub lead_api_token: Option<String>,

    /// "graphql" or "mock"
    pub lead_api_backend: String,

    /// Number of concurrent create-and-assign workers
    pub concurrency: usize,

    /// Directory for failure reports
    pub export_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let lead_api_url = std::env::var("LEAD_API_URL")
            .unwrap_or_else(|_| DEFAULT_LEAD_API_URL.to_string());

        let lead_api_token = std::env::var("LEAD_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let lead_api_backend = std::env::var("LEAD_API_BACKEND")
            .unwrap_or_else(|_| "graphql".to_string());

        let concurrency = match std::env::var("IMPORT_CONCURRENCY") {
            Ok(raw) => parse_concurrency(&raw).context("IMPORT_CONCURRENCY is invalid")?,
            Err(_) => DEFAULT_CONCURRENCY,
        };

        let export_dir = std::env::var("EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./exports"));

        if lead_api_backend == "graphql" && lead_api_token.is_none() {
            tracing::warn!("LEAD_API_TOKEN is not set, requests to {} are unauthenticated", lead_api_url);
        }

        Ok(Self {
            lead_api_url,
            lead_api_token,
            lead_api_backend,
            concurrency,
            export_dir,
        })
    }
}

/// Parse a worker count; must be at least 1
pub fn parse_concurrency(raw: &str) -> Result<usize> {
    let value: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a number", raw))?;
    if value == 0 {
        anyhow::bail!("concurrency must be at least 1");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_concurrency_accepts_positive() {
        assert_eq!(parse_concurrency("8").unwrap(), 8);
        assert_eq!(parse_concurrency(" 2 ").unwrap(), 2);
    }

    #[test]
    fn test_parse_concurrency_rejects_zero_and_garbage() {
        assert!(parse_concurrency("0").is_err());
        assert!(parse_concurrency("four").is_err());
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_defaults_when_unset() {
        std::env::remove_var("LEAD_API_URL");
        std::env::remove_var("IMPORT_CONCURRENCY");
        std::env::remove_var("LEAD_API_BACKEND");

        let config = Config::from_env().unwrap();
        assert_eq!(config.lead_api_url, DEFAULT_LEAD_API_URL);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.lead_api_backend, "graphql");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_concurrency_from_env() {
        std::env::set_var("IMPORT_CONCURRENCY", "6");

        let config = Config::from_env().unwrap();
        assert_eq!(config.concurrency, 6);

        // Cleanup
        std::env::remove_var("IMPORT_CONCURRENCY");
    }
}

//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `upstream.base_url`.
pub const ML_SERVICE_URL_ENV: &str = "ML_SERVICE_URL";
/// Environment variable overriding the port of `listener.bind_address`.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {name} value '{value}'")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ProxyConfig = toml::from_str(&content)?;

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load configuration from an optional file, falling back to defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = ProxyConfig::default();
            apply_overrides(&mut config, |key| std::env::var(key).ok())?;
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Apply environment overrides on top of file values.
///
/// `lookup` is `std::env::var` in production; tests inject a map.
pub fn apply_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ML_SERVICE_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.upstream.base_url = url.trim().trim_end_matches('/').to_string();
    }

    if let Some(port) = lookup(PORT_ENV).filter(|v| !v.trim().is_empty()) {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            name: PORT_ENV,
            value: port.clone(),
        })?;
        let mut addr: SocketAddr = config.listener.bind_address.parse().map_err(|_| {
            ConfigError::Validation(vec![ValidationError::InvalidAddress {
                field: "listener.bind_address",
                value: config.listener.bind_address.clone(),
            }])
        })?;
        addr.set_port(port);
        config.listener.bind_address = addr.to_string();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_url_and_port() {
        let mut config = ProxyConfig::default();
        apply_overrides(
            &mut config,
            env(&[("ML_SERVICE_URL", "http://ml.internal:9000/"), ("PORT", "4000")]),
        )
        .unwrap();

        assert_eq!(config.upstream.base_url, "http://ml.internal:9000");
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut config = ProxyConfig::default();
        let err = apply_overrides(&mut config, env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { name: "PORT", .. }));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:3101"

            [breaker]
            failure_threshold = 5
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.breaker.failure_threshold, 5);
    }

    #[test]
    fn test_invalid_file_reports_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[breaker]\nfailure_threshold = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("breaker.failure_threshold"));
    }
}

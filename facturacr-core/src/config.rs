//! Configuration and environment selection.
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Hacienda environment selection for the reception API.
///
/// This determines which base URL the API client will use:
/// - Production: the live reception service.
/// - Sandbox: the sandbox service Hacienda provides for integration
///   testing. Submissions there are not fiscally binding.
///
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use facturacr_core::config::EnvironmentType;
///
/// let env = EnvironmentType::from_str("testing")?;
/// assert_eq!(env, EnvironmentType::Sandbox);
/// # Ok::<(), facturacr_core::config::EnvironmentParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentType {
    Production,
    Sandbox,
}

/// Error returned when parsing an [`EnvironmentType`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentParseError {
    #[error("unknown Hacienda environment: {input}")]
    Unknown { input: String },
}

impl FromStr for EnvironmentType {
    type Err = EnvironmentParseError;

    fn from_str(env: &str) -> Result<EnvironmentType, EnvironmentParseError> {
        match env.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(EnvironmentType::Production),
            "sandbox" | "testing" | "test" => Ok(EnvironmentType::Sandbox),
            _ => Err(EnvironmentParseError::Unknown {
                input: env.to_string(),
            }),
        }
    }
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::Production => "production",
            EnvironmentType::Sandbox => "sandbox",
        }
    }

    /// Base URL of the reception API v1 for this environment.
    pub fn endpoint_url(&self) -> &'static str {
        match self {
            EnvironmentType::Production => {
                "https://api.comprobanteselectronicos.go.cr/recepcion/v1"
            }
            EnvironmentType::Sandbox => {
                "https://api-sandbox.comprobanteselectronicos.go.cr/recepcion/v1"
            }
        }
    }
}

/// Configuration for the reception API client.
///
/// # Examples
/// ```rust
/// use std::time::Duration;
/// use facturacr_core::config::{Config, EnvironmentType};
///
/// let config = Config::new(EnvironmentType::Production).with_timeout(Duration::from_secs(10));
/// # let _ = config;
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    env: EnvironmentType,
    timeout: Duration,
}

impl Config {
    pub fn new(env: EnvironmentType) -> Self {
        Self {
            env,
            timeout: Duration::from_secs(30),
        }
    }

    /// Per-request timeout. The client never retries on its own; retry
    /// policy (keyed by clave) belongs to the caller.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn env(&self) -> EnvironmentType {
        self.env
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(EnvironmentType::Sandbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_aliases_parse() {
        for alias in ["production", "prod", "PROD"] {
            assert_eq!(
                alias.parse::<EnvironmentType>().unwrap(),
                EnvironmentType::Production
            );
        }
        for alias in ["sandbox", "testing", "test"] {
            assert_eq!(
                alias.parse::<EnvironmentType>().unwrap(),
                EnvironmentType::Sandbox
            );
        }
        assert!("staging".parse::<EnvironmentType>().is_err());
    }

    #[test]
    fn endpoint_urls_are_fixed() {
        assert!(EnvironmentType::Production
            .endpoint_url()
            .starts_with("https://api.comprobanteselectronicos.go.cr"));
        assert!(EnvironmentType::Sandbox
            .endpoint_url()
            .starts_with("https://api-sandbox.comprobanteselectronicos.go.cr"));
    }
}

//! Relay configuration from the process environment.

use std::{env, fmt::Display, str::FromStr, time::Duration};

use crate::connector::{ConnectorConfig, DEFAULT_RECONNECT_DELAY};

/// Environment variable holding the upstream feed URL.
pub const UPSTREAM_URL_VAR: &str = "TRACCAR_WS_URL";
/// Environment variable holding the listen port.
pub const PORT_VAR: &str = "PORT";

/// Upstream feed used when `TRACCAR_WS_URL` is unset.
pub const DEFAULT_UPSTREAM_URL: &str = "ws://localhost:8082/api/socket";
/// Listen port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3001;

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Upstream feed URL (`ws://` or `wss://`).
    pub upstream_url: String,
    /// HTTP / WebSocket listen port.
    pub port: u16,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            port: DEFAULT_PORT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl RelayConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables.
    ///
    /// # Errors
    /// Returns error if a variable is set to an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let upstream_url = load(&lookup, UPSTREAM_URL_VAR, DEFAULT_UPSTREAM_URL.to_string())?;
        if !(upstream_url.starts_with("ws://") || upstream_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid {
                key: UPSTREAM_URL_VAR,
                value: upstream_url,
                reason: "expected a ws:// or wss:// URL".to_string(),
            });
        }

        Ok(Self {
            upstream_url,
            port: load(&lookup, PORT_VAR, DEFAULT_PORT)?,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        })
    }

    /// Settings for the upstream connector.
    #[must_use]
    pub fn connector(&self) -> ConnectorConfig {
        ConnectorConfig {
            url: self.upstream_url.clone(),
            reconnect_delay: self.reconnect_delay,
        }
    }
}

fn load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        tracing::info!("{key} not set, using default: {default}");
        return Ok(default);
    };
    let raw = raw.trim();
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

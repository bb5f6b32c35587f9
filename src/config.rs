//! Webhook receiver configuration
//!
//! All settings come from environment variables; the verification secret is
//! never hardcoded and never logged.
//!
//! - `VERIFY_TOKEN` (required): expected `hub.verify_token` for the handshake
//! - `WEBHOOK_BIND_ALL` (optional): set to "true" to bind 0.0.0.0
//! - `WEBHOOK_PORT` (optional): listen port (default: 8000)
//! - `WEBHOOK_MAX_BODY_BYTES` (optional): POST body capture limit (default: 2 MiB)

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tracing::{info, warn};

use crate::error::ConfigError;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8000;

/// Default upper bound for a captured POST body
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// The shared secret the messaging platform presents during the handshake.
///
/// `Debug` and `Display` are redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyToken(String);

impl VerifyToken {
    /// Wrap a secret, rejecting the empty string
    pub fn new(token: impl Into<String>) -> Result<Self, ConfigError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ConfigError::EmptyVerifyToken);
        }
        Ok(Self(token))
    }

    /// Constant-time comparison against a presented token
    pub fn matches(&self, presented: &str) -> bool {
        constant_time_compare(self.0.as_bytes(), presented.as_bytes())
    }
}

impl fmt::Debug for VerifyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerifyToken(<redacted>)")
    }
}

/// Webhook receiver configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Expected verification token
    pub verify_token: VerifyToken,

    /// Bind address derived from `WEBHOOK_BIND_ALL`
    pub bind_addr: IpAddr,

    /// Listen port
    pub port: u16,

    /// Maximum number of body bytes captured per POST
    pub max_body_bytes: usize,
}

impl WebhookConfig {
    /// Build a configuration with defaults around the given secret
    pub fn new(verify_token: VerifyToken) -> Self {
        Self {
            verify_token,
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` wrapping `MissingVerifyToken` if `VERIFY_TOKEN`
    /// is not set, `EmptyVerifyToken` if it is empty, and `InvalidValue` for
    /// unparsable numeric settings.
    pub fn from_env() -> crate::Result<Self> {
        Ok(Self::from_lookup(|name| env::var(name).ok())?)
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("VERIFY_TOKEN").ok_or(ConfigError::MissingVerifyToken)?;
        let verify_token = VerifyToken::new(token)?;

        let bind_all = lookup("WEBHOOK_BIND_ALL")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let bind_addr = if bind_all {
            warn!("Binding to 0.0.0.0 (WEBHOOK_BIND_ALL=true)");
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };

        let port = match lookup("WEBHOOK_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue {
                    name: "WEBHOOK_PORT",
                    reason: e.to_string(),
                })?,
            None => DEFAULT_PORT,
        };

        let max_body_bytes = match lookup("WEBHOOK_MAX_BODY_BYTES") {
            Some(raw) => {
                let limit =
                    raw.trim()
                        .parse::<usize>()
                        .map_err(|e| ConfigError::InvalidValue {
                            name: "WEBHOOK_MAX_BODY_BYTES",
                            reason: e.to_string(),
                        })?;
                if limit == 0 {
                    return Err(ConfigError::InvalidValue {
                        name: "WEBHOOK_MAX_BODY_BYTES",
                        reason: "limit cannot be 0".to_string(),
                    });
                }
                limit
            }
            None => DEFAULT_MAX_BODY_BYTES,
        };

        info!(
            bind_addr = %bind_addr,
            port,
            max_body_bytes,
            "Webhook configuration loaded"
        );

        Ok(Self {
            verify_token,
            bind_addr,
            port,
            max_body_bytes,
        })
    }

    /// Socket address to listen on
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Create a test configuration (for testing only)
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self::new(VerifyToken("test-verify-token".to_string()))
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = WebhookConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVerifyToken);
    }

    #[test]
    fn test_empty_token_is_rejected() {
        let err = WebhookConfig::from_lookup(lookup_from(&[("VERIFY_TOKEN", "")])).unwrap_err();
        assert_eq!(err, ConfigError::EmptyVerifyToken);
    }

    #[test]
    fn test_defaults() {
        let config =
            WebhookConfig::from_lookup(lookup_from(&[("VERIFY_TOKEN", "s3cret")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(config.verify_token.matches("s3cret"));
    }

    #[test]
    fn test_overrides() {
        let config = WebhookConfig::from_lookup(lookup_from(&[
            ("VERIFY_TOKEN", "s3cret"),
            ("WEBHOOK_BIND_ALL", "TRUE"),
            ("WEBHOOK_PORT", "9443"),
            ("WEBHOOK_MAX_BODY_BYTES", "4096"),
        ]))
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:9443");
        assert_eq!(config.max_body_bytes, 4096);
    }

    #[test]
    fn test_invalid_port() {
        let err = WebhookConfig::from_lookup(lookup_from(&[
            ("VERIFY_TOKEN", "s3cret"),
            ("WEBHOOK_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "WEBHOOK_PORT",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_body_limit() {
        let err = WebhookConfig::from_lookup(lookup_from(&[
            ("VERIFY_TOKEN", "s3cret"),
            ("WEBHOOK_MAX_BODY_BYTES", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("cannot be 0"));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let config =
            WebhookConfig::from_lookup(lookup_from(&[("VERIFY_TOKEN", "hunter2")])).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_token_matching() {
        let token = VerifyToken::new("abc").unwrap();
        assert!(token.matches("abc"));
        assert!(!token.matches("abd"));
        assert!(!token.matches("ab"));
        assert!(!token.matches(""));
    }
}

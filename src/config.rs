//! Environment-driven configuration.
//!
//! Values are read from the process environment after `.env` has been
//! loaded by the binary.
//!
//! ## Server
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Bind address | `0.0.0.0` |
//! | `PORT` | Bind port | `3000` |
//! | `REQUEST_TIMEOUT_SECS` | Per-request handler timeout | `30` |
//! | `ENABLE_METRICS` | Install the Prometheus recorder | `true` |
//! | `LOG_FORMAT` | `json` or `pretty` | `pretty` |
//! | `RUST_LOG` | Log filter | `info,tower_http=debug` |
//!
//! ## Client
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `API_BASE_URL` | Credits API base URL | `http://127.0.0.1:3000` |
//! | `LEDGER_NODE_URL` | Ledger full node | `https://fullnode.devnet.aptoslabs.com` |
//! | `WALLET_PRIVATE_KEY` | Base58 ed25519 secret | ephemeral key |
//! | `LEDGER_MODULE` | On-chain credits module | `carbon_credits` |
//! | `CONFIRM_TRANSACTIONS` | Wait for ledger commit before updating records | `false` |
//! | `CONFIRMATION_TIMEOUT_SECS` | Commit wait limit | `60` |

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::domain::ConfigError;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const ENABLE_METRICS_ENV: &str = "ENABLE_METRICS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const API_BASE_URL_ENV: &str = "API_BASE_URL";
pub const LEDGER_NODE_URL_ENV: &str = "LEDGER_NODE_URL";
pub const WALLET_PRIVATE_KEY_ENV: &str = "WALLET_PRIVATE_KEY";
pub const LEDGER_MODULE_ENV: &str = "LEDGER_MODULE";
pub const CONFIRM_TRANSACTIONS_ENV: &str = "CONFIRM_TRANSACTIONS";
pub const CONFIRMATION_TIMEOUT_ENV: &str = "CONFIRMATION_TIMEOUT_SECS";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_LEDGER_NODE_URL: &str = "https://fullnode.devnet.aptoslabs.com";

/// Default `RUST_LOG` filter
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("expected 'json' or 'pretty', got '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => f.write_str("json"),
            LogFormat::Pretty => f.write_str("pretty"),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub enable_metrics: bool,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(30),
            enable_metrics: true,
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; missing keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: lookup(HOST_ENV).unwrap_or(defaults.host),
            port: parse_or(&lookup, PORT_ENV, defaults.port)?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                REQUEST_TIMEOUT_ENV,
                defaults.request_timeout.as_secs(),
            )?),
            enable_metrics: parse_bool_or(&lookup, ENABLE_METRICS_ENV, defaults.enable_metrics)?,
            log_format: parse_or(&lookup, LOG_FORMAT_ENV, defaults.log_format)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Marketplace client settings
#[derive(Debug)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ledger_node_url: String,
    pub wallet_private_key: Option<SecretString>,
    pub ledger_module: String,
    pub confirm_transactions: bool,
    pub confirmation_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ledger_node_url: DEFAULT_LEDGER_NODE_URL.to_string(),
            wallet_private_key: None,
            ledger_module: crate::domain::LedgerModule::DEFAULT_NAME.to_string(),
            confirm_transactions: false,
            confirmation_timeout: Duration::from_secs(60),
            log_format: LogFormat::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            api_base_url: lookup(API_BASE_URL_ENV).unwrap_or(defaults.api_base_url),
            ledger_node_url: lookup(LEDGER_NODE_URL_ENV).unwrap_or(defaults.ledger_node_url),
            wallet_private_key: lookup(WALLET_PRIVATE_KEY_ENV)
                .filter(|key| !key.trim().is_empty())
                .map(SecretString::from),
            ledger_module: lookup(LEDGER_MODULE_ENV).unwrap_or(defaults.ledger_module),
            confirm_transactions: parse_bool_or(
                &lookup,
                CONFIRM_TRANSACTIONS_ENV,
                defaults.confirm_transactions,
            )?,
            confirmation_timeout: Duration::from_secs(parse_or(
                &lookup,
                CONFIRMATION_TIMEOUT_ENV,
                defaults.confirmation_timeout.as_secs(),
            )?),
            log_format: parse_or(&lookup, LOG_FORMAT_ENV, defaults.log_format)?,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

fn parse_bool_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{v}'"),
        }),
    }
}

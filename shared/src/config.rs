use crate::gateway::GatewaySettings;
use crate::ids::UserId;
use crate::pagination::{PaginationSettings, DEFAULT_LIMIT, MAX_LIMIT};
use crate::store::{StoreTimeouts, StoreUri};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const STORE_URI: &str = "STORE_URI";
/// Set by the Lambda runtime; its presence selects the gateway binding
pub const LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
pub const PORT: &str = "PORT";
pub const STORE_CONNECT_TIMEOUT_MS: &str = "STORE_CONNECT_TIMEOUT_MS";
pub const STORE_OPERATION_TIMEOUT_MS: &str = "STORE_OPERATION_TIMEOUT_MS";
pub const REQUEST_TIMEOUT_MS: &str = "REQUEST_TIMEOUT_MS";
pub const PAGE_LIMIT_DEFAULT: &str = "PAGE_LIMIT_DEFAULT";
pub const PAGE_LIMIT_MAX: &str = "PAGE_LIMIT_MAX";
pub const GATEWAY_FALLBACK_USER_ID: &str = "GATEWAY_FALLBACK_USER_ID";
pub const GATEWAY_STRICT_ROUTES: &str = "GATEWAY_STRICT_ROUTES";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_FALLBACK_USER_ID: &str = "5ce930b307a444000179a4e0";

/// Fatal startup configuration problems
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which transport binding this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    Server,
    Gateway,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: BindingMode,
    pub store_uri: StoreUri,
    pub store_timeouts: StoreTimeouts,
    pub port: u16,
    pub pagination: PaginationSettings,
    pub gateway: GatewaySettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_uri = get(STORE_URI).ok_or(ConfigError::Missing(STORE_URI))?;
        let store_uri = parse_value(STORE_URI, &store_uri)?;

        let mode = if get(LAMBDA_FUNCTION_NAME).is_some() {
            BindingMode::Gateway
        } else {
            BindingMode::Server
        };

        let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match get(key) {
                Some(raw) => parse_value::<u64>(key, &raw).map(Duration::from_millis),
                None => Ok(default),
            }
        };

        let defaults = StoreTimeouts::default();
        let store_timeouts = StoreTimeouts {
            connect: millis(STORE_CONNECT_TIMEOUT_MS, defaults.connect)?,
            operation: millis(STORE_OPERATION_TIMEOUT_MS, defaults.operation)?,
        };

        let port = match get(PORT) {
            Some(raw) => parse_value(PORT, &raw)?,
            None => DEFAULT_PORT,
        };

        let pagination = PaginationSettings {
            default_limit: positive(PAGE_LIMIT_DEFAULT, get(PAGE_LIMIT_DEFAULT), DEFAULT_LIMIT)?,
            max_limit: positive(PAGE_LIMIT_MAX, get(PAGE_LIMIT_MAX), MAX_LIMIT)?,
        };

        let fallback_raw =
            get(GATEWAY_FALLBACK_USER_ID).unwrap_or_else(|| DEFAULT_FALLBACK_USER_ID.to_string());
        let fallback_user_id =
            UserId::decode(&fallback_raw).map_err(|e| ConfigError::Invalid {
                key: GATEWAY_FALLBACK_USER_ID,
                value: fallback_raw.clone(),
                reason: e.to_string(),
            })?;

        let strict_routes = match get(GATEWAY_STRICT_ROUTES) {
            Some(raw) => parse_value(GATEWAY_STRICT_ROUTES, &raw.to_lowercase())?,
            None => false,
        };

        let gateway = GatewaySettings {
            request_timeout: millis(REQUEST_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT)?,
            fallback_user_id,
            strict_routes,
        };

        Ok(Self {
            mode,
            store_uri,
            store_timeouts,
            port,
            pagination,
            gateway,
        })
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn positive(key: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => match parse_value::<u64>(key, &raw)? {
            0 => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: "must be greater than zero".to_string(),
            }),
            n => Ok(n),
        },
    }
}

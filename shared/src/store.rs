//! Store selection from the `STORE_URI` setting
//!
//! - `memory://` keeps users in process (development and tests)
//! - `dynamodb://<table>` uses the regional DynamoDB endpoint
//! - `http://host:port/<table>` / `https://...` targets an explicit endpoint,
//!   e.g. DynamoDB Local

use crate::dynamo::{DynamoSettings, DynamoUserRepository};
use crate::memory::MemoryUserRepository;
use crate::users::UserRepository;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    Memory,
    DynamoDb {
        endpoint: Option<String>,
        table: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid store URI {uri:?}: {reason}")]
pub struct InvalidStoreUri {
    pub uri: String,
    pub reason: String,
}

impl FromStr for StoreUri {
    type Err = InvalidStoreUri;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| InvalidStoreUri {
            uri: s.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(s.trim()).map_err(|e| invalid(&e.to_string()))?;

        match url.scheme() {
            "memory" => Ok(StoreUri::Memory),
            "dynamodb" => {
                let table = url
                    .host_str()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| invalid("missing table name"))?;
                Ok(StoreUri::DynamoDb {
                    endpoint: None,
                    table: table.to_string(),
                })
            }
            "http" | "https" => {
                let table = url
                    .path()
                    .trim_matches('/')
                    .to_string();
                if table.is_empty() || table.contains('/') {
                    return Err(invalid("path must be a single table name"));
                }
                let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
                let endpoint = match url.port() {
                    Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                    None => format!("{}://{}", url.scheme(), host),
                };
                Ok(StoreUri::DynamoDb {
                    endpoint: Some(endpoint),
                    table,
                })
            }
            other => Err(invalid(&format!("unsupported scheme {}", other))),
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreUri::Memory => write!(f, "memory://"),
            StoreUri::DynamoDb { endpoint: None, table } => write!(f, "dynamodb://{}", table),
            StoreUri::DynamoDb {
                endpoint: Some(endpoint),
                table,
            } => write!(f, "{}/{}", endpoint, table),
        }
    }
}

/// Deadlines applied to every store connection and round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTimeouts {
    pub connect: Duration,
    pub operation: Duration,
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            operation: Duration::from_secs(2),
        }
    }
}

/// Build the repository for `uri` and establish its connection
pub async fn connect(uri: &StoreUri, timeouts: StoreTimeouts) -> Arc<dyn UserRepository> {
    match uri {
        StoreUri::Memory => {
            tracing::warn!("Using in-memory user store; data is lost on exit");
            Arc::new(MemoryUserRepository::new())
        }
        StoreUri::DynamoDb { endpoint, table } => {
            let repo = DynamoUserRepository::new(DynamoSettings {
                table_name: table.clone(),
                endpoint: endpoint.clone(),
                connect_timeout: timeouts.connect,
                operation_timeout: timeouts.operation,
            });
            repo.connect().await;
            Arc::new(repo)
        }
    }
}

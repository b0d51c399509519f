//! Storage account connection strings.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use url::Url;

use crate::storage::StorageError;

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// The four service endpoints of a storage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub blob: Url,
    pub queue: Url,
    pub table: Url,
    pub file: Url,
}

/// A parsed `AccountName=..;AccountKey=..;...` connection string.
#[derive(Clone)]
pub struct ConnectionString {
    account_name: String,
    account_key: SecretString,
    endpoints: ServiceEndpoints,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"[REDACTED]")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl ConnectionString {
    /// Parse a connection string.
    ///
    /// Keys are case-insensitive. `AccountName` and `AccountKey` are
    /// required. Each service endpoint is taken from its explicit
    /// `*Endpoint` setting when present, otherwise derived from
    /// `DefaultEndpointsProtocol` and `EndpointSuffix`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionString`] naming the first missing
    /// or malformed setting.
    pub fn parse(value: &str) -> Result<Self, StorageError> {
        let mut settings: HashMap<String, &str> = HashMap::new();
        for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                StorageError::ConnectionString(format!("setting without '=': {pair}"))
            })?;
            settings.insert(key.trim().to_ascii_lowercase(), value.trim());
        }

        let setting = |key: &str| settings.get(key).copied().filter(|v| !v.is_empty());
        let account_name = setting("accountname")
            .ok_or_else(|| StorageError::ConnectionString("AccountName is required".to_owned()))?
            .to_owned();
        let account_key = setting("accountkey")
            .ok_or_else(|| StorageError::ConnectionString("AccountKey is required".to_owned()))?;

        let protocol = setting("defaultendpointsprotocol").unwrap_or(DEFAULT_PROTOCOL);
        let suffix = setting("endpointsuffix").unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
        let endpoint = |service: &str| -> Result<Url, StorageError> {
            let raw = setting(&format!("{service}endpoint")).map_or_else(
                || format!("{protocol}://{account_name}.{service}.{suffix}"),
                str::to_owned,
            );
            Url::parse(&raw).map_err(|e| {
                StorageError::ConnectionString(format!("invalid {service} endpoint {raw}: {e}"))
            })
        };

        let endpoints = ServiceEndpoints {
            blob: endpoint("blob")?,
            queue: endpoint("queue")?,
            table: endpoint("table")?,
            file: endpoint("file")?,
        };

        Ok(Self {
            account_name,
            account_key: SecretString::from(account_key.to_owned()),
            endpoints,
        })
    }

    #[must_use]
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// The base64 account key.
    #[must_use]
    pub fn account_key(&self) -> &SecretString {
        &self.account_key
    }

    #[must_use]
    pub const fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }
}

impl FromStr for ConnectionString {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

//! Azure Storage backends over the REST APIs.
//!
//! Every request is signed with the account's Shared Key (Shared Key Lite
//! for the table service) and sent once; non-2xx responses become
//! [`StorageError::Service`] carrying the `x-ms-error-code` header.

mod auth;
mod blob;
mod connection_string;
mod file;
mod queue;
mod table;
mod xml;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use tracing::debug;
use url::Url;

use auth::SharedKey;
pub use blob::AzureBlobStore;
pub use connection_string::{ConnectionString, ServiceEndpoints};
pub use file::AzureFileShare;
pub use queue::AzureQueue;
pub use table::AzureTableStore;

use super::{StorageBackends, StorageError, StorageResult};

/// `x-ms-version` for the blob, queue and file services.
const STORAGE_VERSION: &str = "2021-12-02";
/// `x-ms-version` for the table service.
const TABLE_VERSION: &str = "2019-02-02";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// All four Azure backends for one storage account.
#[derive(Debug, Clone)]
pub struct AzureStorage {
    tables: AzureTableStore,
    blobs: AzureBlobStore,
    queue: AzureQueue,
    files: AzureFileShare,
}

impl AzureStorage {
    /// Build clients for every service named by the connection string.
    ///
    /// No request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the account key is not base64 or the HTTP client
    /// cannot be built.
    pub fn new(connection: &ConnectionString) -> StorageResult<Self> {
        let key = Arc::new(SharedKey::new(
            connection.account_name(),
            connection.account_key(),
        )?);
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("abc-retail/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let endpoints = connection.endpoints();
        let client = |endpoint: &Url, auth: AuthScheme, version: &'static str| ServiceClient {
            http: http.clone(),
            key: Arc::clone(&key),
            endpoint: endpoint.clone(),
            auth,
            version,
        };

        Ok(Self {
            tables: AzureTableStore::new(client(
                &endpoints.table,
                AuthScheme::SharedKeyLite,
                TABLE_VERSION,
            )),
            blobs: AzureBlobStore::new(client(
                &endpoints.blob,
                AuthScheme::SharedKey,
                STORAGE_VERSION,
            )),
            queue: AzureQueue::new(client(
                &endpoints.queue,
                AuthScheme::SharedKey,
                STORAGE_VERSION,
            )),
            files: AzureFileShare::new(client(
                &endpoints.file,
                AuthScheme::SharedKey,
                STORAGE_VERSION,
            )),
        })
    }

    /// Hand the clients to the storage facade.
    #[must_use]
    pub fn into_backends(self) -> StorageBackends {
        StorageBackends {
            entities: Arc::new(self.tables),
            blobs: Arc::new(self.blobs),
            queue: Arc::new(self.queue),
            files: Arc::new(self.files),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthScheme {
    SharedKey,
    SharedKeyLite,
}

/// A signed HTTP client bound to one service endpoint.
#[derive(Debug, Clone)]
struct ServiceClient {
    http: reqwest::Client,
    key: Arc<SharedKey>,
    endpoint: Url,
    auth: AuthScheme,
    version: &'static str,
}

impl ServiceClient {
    /// Resolve `segments` under the endpoint, percent-encoding each one.
    fn url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
        query: &[(&str, &str)],
    ) -> StorageResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                StorageError::Malformed(format!("endpoint {} cannot have a path", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Sign and send a request, failing on any non-success status.
    async fn send(
        &self,
        method: Method,
        url: Url,
        mut headers: HeaderMap,
        body: Bytes,
    ) -> StorageResult<Response> {
        let date = auth::http_date(Utc::now());
        headers.insert(HeaderName::from_static("x-ms-date"), header_value(&date)?);
        headers.insert(
            HeaderName::from_static("x-ms-version"),
            HeaderValue::from_static(self.version),
        );

        let authorization = match self.auth {
            AuthScheme::SharedKey => self.key.shared_key(&method, &url, &headers, body.len())?,
            AuthScheme::SharedKeyLite => self.key.shared_key_lite(&url, &date)?,
        };
        headers.insert(reqwest::header::AUTHORIZATION, header_value(&authorization)?);

        debug!(%method, path = url.path(), "Storage request");
        let response = self
            .http
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        check(response).await
    }
}

fn header_value(value: &str) -> StorageResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| StorageError::Malformed(format!("invalid header value {value:?}: {e}")))
}

/// Turn a non-success response into [`StorageError::Service`].
async fn check(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || status.canonical_reason().unwrap_or("Unknown").to_owned(),
            str::to_owned,
        );
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Service {
        status: status.as_u16(),
        code,
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn client(endpoint: &str) -> ServiceClient {
        ServiceClient {
            http: reqwest::Client::new(),
            key: Arc::new(SharedKey::new("acct", &SecretString::from("a2V5")).unwrap()),
            endpoint: Url::parse(endpoint).unwrap(),
            auth: AuthScheme::SharedKey,
            version: STORAGE_VERSION,
        }
    }

    #[test]
    fn test_url_encodes_segments() {
        let url = client("https://acct.blob.core.windows.net")
            .url(["images", "a b.png"], &[])
            .unwrap();
        assert_eq!(url.as_str(), "https://acct.blob.core.windows.net/images/a%20b.png");
    }

    #[test]
    fn test_url_keeps_endpoint_path() {
        let url = client("http://127.0.0.1:10001/devstoreaccount1")
            .url(["order-queue", "messages"], &[("numofmessages", "1")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:10001/devstoreaccount1/order-queue/messages?numofmessages=1"
        );
    }

    #[test]
    fn test_new_rejects_bad_key() {
        let conn = ConnectionString::parse("AccountName=a;AccountKey=%%%").unwrap();
        assert!(matches!(
            AzureStorage::new(&conn),
            Err(StorageError::ConnectionString(_))
        ));
    }

    #[test]
    fn test_new_builds_all_backends() {
        let conn = ConnectionString::parse("AccountName=a;AccountKey=a2V5").unwrap();
        let _backends = AzureStorage::new(&conn).unwrap().into_backends();
    }
}

//! Shared Key request signing and service SAS generation.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Method;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use sha2::Sha256;
use url::Url;

use crate::storage::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// Standard headers in Shared Key string-to-sign order, after the verb.
const SIGNED_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

/// Format a timestamp the way `x-ms-date` expects (RFC 1123).
#[must_use]
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Account credentials for signing requests.
pub struct SharedKey {
    account: String,
    key: SecretSlice<u8>,
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKey")
            .field("account", &self.account)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SharedKey {
    /// Decode the base64 account key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionString`] if the key is not base64.
    pub fn new(account: &str, key: &SecretString) -> StorageResult<Self> {
        let key = BASE64_STANDARD
            .decode(key.expose_secret())
            .map_err(|e| StorageError::ConnectionString(format!("AccountKey is not base64: {e}")))?;
        Ok(Self {
            account: account.to_owned(),
            key: SecretSlice::from(key),
        })
    }

    fn sign(&self, string_to_sign: &str) -> StorageResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret())
            .map_err(|e| StorageError::ConnectionString(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// `Authorization` value for the blob, queue and file services.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be used for HMAC.
    pub fn shared_key(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        content_length: usize,
    ) -> StorageResult<String> {
        let string_to_sign = self.string_to_sign(method, url, headers, content_length);
        Ok(format!(
            "SharedKey {}:{}",
            self.account,
            self.sign(&string_to_sign)?
        ))
    }

    /// `Authorization` value for the table service.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be used for HMAC.
    pub fn shared_key_lite(&self, url: &Url, date: &str) -> StorageResult<String> {
        let string_to_sign = self.lite_string_to_sign(url, date);
        Ok(format!(
            "SharedKeyLite {}:{}",
            self.account,
            self.sign(&string_to_sign)?
        ))
    }

    /// Query parameters granting read access to one blob until `expiry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be used for HMAC.
    pub fn blob_read_sas(
        &self,
        container: &str,
        blob: &str,
        expiry: DateTime<Utc>,
        version: &str,
    ) -> StorageResult<Vec<(&'static str, String)>> {
        let expiry = expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let string_to_sign = self.sas_string_to_sign(container, blob, &expiry, version);
        Ok(vec![
            ("sv", version.to_owned()),
            ("sr", "b".to_owned()),
            ("sp", "r".to_owned()),
            ("se", expiry),
            ("sig", self.sign(&string_to_sign)?),
        ])
    }

    fn string_to_sign(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        content_length: usize,
    ) -> String {
        let mut lines = vec![method.as_str().to_owned()];
        for name in SIGNED_HEADERS {
            let value = if name == "content-length" {
                if content_length == 0 {
                    String::new()
                } else {
                    content_length.to_string()
                }
            } else {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_owned()
            };
            lines.push(value);
        }

        let mut ms_headers: Vec<(String, String)> = headers
            .iter()
            .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    value.to_str().unwrap_or_default().trim().to_owned(),
                )
            })
            .collect();
        ms_headers.sort();
        lines.extend(
            ms_headers
                .into_iter()
                .map(|(name, value)| format!("{name}:{value}")),
        );

        lines.push(self.canonicalized_resource(url));
        lines.join("\n")
    }

    fn canonicalized_resource(&self, url: &Url) -> String {
        let mut resource = format!("/{}{}", self.account, url.path());

        let mut params: Vec<(String, Vec<String>)> = Vec::new();
        for (name, value) in url.query_pairs() {
            let name = name.to_lowercase();
            match params.iter_mut().find(|(n, _)| *n == name) {
                Some((_, values)) => values.push(value.into_owned()),
                None => params.push((name, vec![value.into_owned()])),
            }
        }
        params.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, mut values) in params {
            values.sort();
            resource.push_str(&format!("\n{name}:{}", values.join(",")));
        }
        resource
    }

    fn lite_string_to_sign(&self, url: &Url, date: &str) -> String {
        let mut resource = format!("/{}{}", self.account, url.path());
        if let Some((_, comp)) = url.query_pairs().find(|(name, _)| name == "comp") {
            resource.push_str(&format!("?comp={comp}"));
        }
        format!("{date}\n{resource}")
    }

    fn sas_string_to_sign(&self, container: &str, blob: &str, expiry: &str, version: &str) -> String {
        let resource = format!("/blob/{}/{container}/{blob}", self.account);
        // permissions, start, expiry, resource, identifier, ip, protocol,
        // version, resource type, snapshot, encryption scope, then the five
        // response header overrides.
        [
            "r", "", expiry, resource.as_str(), "", "", "", version, "b", "", "", "", "", "", "", "",
        ]
        .join("\n")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    use super::*;

    fn key() -> SharedKey {
        SharedKey::new("acct", &SecretString::from("c2VjcmV0LWtleQ==")).unwrap()
    }

    #[test]
    fn test_rejects_non_base64_key() {
        assert!(matches!(
            SharedKey::new("acct", &SecretString::from("not base64!")),
            Err(StorageError::ConnectionString(_))
        ));
    }

    #[test]
    fn test_http_date_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 9, 10).unwrap();
        assert_eq!(http_date(at), "Wed, 01 May 2024 08:09:10 GMT");
    }

    #[test]
    fn test_string_to_sign_layout() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-version", HeaderValue::from_static("2021-12-02"));
        headers.insert("x-ms-date", HeaderValue::from_static("Wed, 01 May 2024 08:09:10 GMT"));
        headers.insert("content-type", HeaderValue::from_static("image/png"));
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        let url = Url::parse("https://acct.blob.core.windows.net/images/a%20b.png").unwrap();

        let signed = key().string_to_sign(&Method::PUT, &url, &headers, 3);
        assert_eq!(
            signed,
            "PUT\n\n\n3\n\nimage/png\n\n\n\n\n\n\n\
             x-ms-blob-type:BlockBlob\n\
             x-ms-date:Wed, 01 May 2024 08:09:10 GMT\n\
             x-ms-version:2021-12-02\n\
             /acct/images/a%20b.png"
        );
    }

    #[test]
    fn test_zero_length_is_blank() {
        let url = Url::parse("https://acct.queue.core.windows.net/order-queue").unwrap();
        let signed = key().string_to_sign(&Method::PUT, &url, &HeaderMap::new(), 0);
        assert!(signed.starts_with("PUT\n\n\n\n"));
    }

    #[test]
    fn test_canonicalized_query_is_sorted_and_lowercased() {
        let url = Url::parse(
            "https://acct.file.core.windows.net/contracts/dummycontracts?restype=directory&comp=list&Marker=a%2Cb",
        )
        .unwrap();
        assert_eq!(
            key().canonicalized_resource(&url),
            "/acct/contracts/dummycontracts\ncomp:list\nmarker:a,b\nrestype:directory"
        );
    }

    #[test]
    fn test_path_style_endpoint_keeps_account_segment() {
        let url = Url::parse("http://127.0.0.1:10000/acct/images").unwrap();
        assert_eq!(key().canonicalized_resource(&url), "/acct/acct/images");
    }

    #[test]
    fn test_lite_string_to_sign() {
        let url = Url::parse(
            "https://acct.table.core.windows.net/Customers()?NextPartitionKey=x",
        )
        .unwrap();
        assert_eq!(
            key().lite_string_to_sign(&url, "Wed, 01 May 2024 08:09:10 GMT"),
            "Wed, 01 May 2024 08:09:10 GMT\n/acct/Customers()"
        );
    }

    #[test]
    fn test_signatures_are_deterministic() {
        let url = Url::parse("https://acct.table.core.windows.net/Tables").unwrap();
        let first = key().shared_key_lite(&url, "date").unwrap();
        let second = key().shared_key_lite(&url, "date").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("SharedKeyLite acct:"));
        // base64 of a 32-byte HMAC
        assert_eq!(first.len(), "SharedKeyLite acct:".len() + 44);
    }

    #[test]
    fn test_blob_read_sas_parameters() {
        let expiry = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let params = key()
            .blob_read_sas("images", "a.png", expiry, "2021-12-02")
            .unwrap();
        let names: Vec<&str> = params.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["sv", "sr", "sp", "se", "sig"]);
        assert_eq!(params[3].1, "2024-05-02T00:00:00Z");

        let signed = key().sas_string_to_sign("images", "a.png", "2024-05-02T00:00:00Z", "2021-12-02");
        assert_eq!(signed.split('\n').count(), 16);
        assert!(signed.starts_with("r\n\n2024-05-02T00:00:00Z\n/blob/acct/images/a.png\n"));
    }
}

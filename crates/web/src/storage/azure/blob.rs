//! Blob service client.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use super::{ServiceClient, header_value};
use crate::storage::{BlobStore, ContainerAccess, StorageError, StorageResult, ignore_conflict};

/// [`BlobStore`] backed by Azure Blob storage.
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    client: ServiceClient,
}

impl AzureBlobStore {
    pub(super) const fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn create_container_if_not_exists(
        &self,
        container: &str,
        access: ContainerAccess,
    ) -> StorageResult<()> {
        let url = self.client.url([container], &[("restype", "container")])?;
        let mut headers = HeaderMap::new();
        if access == ContainerAccess::PublicBlob {
            headers.insert("x-ms-blob-public-access", HeaderValue::from_static("blob"));
        }

        ignore_conflict(
            self.client
                .send(Method::PUT, url, headers, Bytes::new())
                .await
                .map(drop),
        )
    }

    async fn upload_blob(
        &self,
        container: &str,
        name: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let url = self.client.url([container, name], &[])?;
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("BlockBlob"));
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, header_value(content_type)?);
        }

        self.client.send(Method::PUT, url, headers, content).await?;
        Ok(())
    }

    async fn download_blob(&self, container: &str, name: &str) -> StorageResult<Option<Bytes>> {
        let url = self.client.url([container, name], &[])?;
        match self
            .client
            .send(Method::GET, url, HeaderMap::new(), Bytes::new())
            .await
        {
            Ok(response) => Ok(Some(response.bytes().await?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn blob_url(&self, container: &str, name: &str) -> StorageResult<String> {
        Ok(self.client.url([container, name], &[])?.into())
    }

    fn signed_read_url(
        &self,
        container: &str,
        name: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::Malformed(format!("signed URL lifetime: {e}")))?;
        let params =
            self.client
                .key
                .blob_read_sas(container, name, Utc::now() + ttl, self.client.version)?;

        let mut url = self.client.url([container, name], &[])?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url.into())
    }
}

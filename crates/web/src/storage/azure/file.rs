//! File service client.

use std::sync::LazyLock;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};

use super::{ServiceClient, header_value, xml};
use crate::storage::{
    DirectoryEntry, DirectoryPage, EntryKind, FileShare, StorageResult, ignore_conflict,
};

/// Largest range a single Put Range call accepts.
const MAX_RANGE_BYTES: usize = 4 * 1024 * 1024;

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(File|Directory)>(.*?)</(?:File|Directory)>").expect("Invalid regex")
});

/// [`FileShare`] backed by Azure Files.
#[derive(Debug, Clone)]
pub struct AzureFileShare {
    client: ServiceClient,
}

impl AzureFileShare {
    pub(super) const fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    fn path_url<'a>(
        &self,
        share: &'a str,
        path: &'a str,
        query: &[(&str, &str)],
    ) -> StorageResult<url::Url> {
        let segments = std::iter::once(share).chain(path.split('/').filter(|s| !s.is_empty()));
        self.client.url(segments, query)
    }
}

/// SMB properties new files and directories are created with.
fn smb_headers(attributes: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-ms-file-permission", HeaderValue::from_static("inherit"));
    headers.insert("x-ms-file-attributes", HeaderValue::from_static(attributes));
    headers.insert("x-ms-file-creation-time", HeaderValue::from_static("now"));
    headers.insert("x-ms-file-last-write-time", HeaderValue::from_static("now"));
    headers
}

/// Byte ranges covering `len` bytes in chunks the service accepts.
fn ranges(len: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..len)
        .step_by(MAX_RANGE_BYTES)
        .map(move |start| (start, len.min(start + MAX_RANGE_BYTES)))
}

fn parse_listing(body: &str) -> DirectoryPage {
    let entries = ENTRY_RE
        .captures_iter(body)
        .filter_map(|caps| {
            let kind = match caps.get(1)?.as_str() {
                "Directory" => EntryKind::Directory,
                _ => EntryKind::File,
            };
            let name = xml::child_text(caps.get(2)?.as_str(), "Name")?;
            Some(DirectoryEntry { name, kind })
        })
        .collect();
    let next_marker = xml::child_text(body, "NextMarker").filter(|m| !m.is_empty());

    DirectoryPage {
        entries,
        next_marker,
    }
}

#[async_trait]
impl FileShare for AzureFileShare {
    async fn create_share_if_not_exists(&self, share: &str) -> StorageResult<()> {
        let url = self.client.url([share], &[("restype", "share")])?;
        ignore_conflict(
            self.client
                .send(Method::PUT, url, HeaderMap::new(), Bytes::new())
                .await
                .map(drop),
        )
    }

    async fn create_directory_if_not_exists(
        &self,
        share: &str,
        directory: &str,
    ) -> StorageResult<()> {
        let url = self.path_url(share, directory, &[("restype", "directory")])?;
        ignore_conflict(
            self.client
                .send(Method::PUT, url, smb_headers("Directory"), Bytes::new())
                .await
                .map(drop),
        )
    }

    async fn create_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StorageResult<()> {
        let path = format!("{directory}/{name}");
        let url = self.path_url(share, &path, &[])?;
        let mut headers = smb_headers("None");
        headers.insert("x-ms-type", HeaderValue::from_static("file"));
        headers.insert("x-ms-content-length", header_value(&length.to_string())?);

        self.client
            .send(Method::PUT, url, headers, Bytes::new())
            .await?;
        Ok(())
    }

    async fn write_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        content: Bytes,
    ) -> StorageResult<()> {
        let path = format!("{directory}/{name}");
        for (start, end) in ranges(content.len()) {
            let url = self.path_url(share, &path, &[("comp", "range")])?;
            let mut headers = HeaderMap::new();
            headers.insert("x-ms-write", HeaderValue::from_static("update"));
            headers.insert(
                "x-ms-range",
                header_value(&format!("bytes={start}-{}", end - 1))?,
            );

            self.client
                .send(Method::PUT, url, headers, content.slice(start..end))
                .await?;
        }
        Ok(())
    }

    async fn list_directory_page(
        &self,
        share: &str,
        directory: &str,
        marker: Option<String>,
    ) -> StorageResult<DirectoryPage> {
        let mut query = vec![("restype", "directory"), ("comp", "list")];
        if let Some(marker) = marker.as_deref() {
            query.push(("marker", marker));
        }
        let url = self.path_url(share, directory, &query)?;

        let response = self
            .client
            .send(Method::GET, url, HeaderMap::new(), Bytes::new())
            .await?;
        Ok(parse_listing(&response.text().await?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_split_at_limit() {
        assert_eq!(ranges(0).count(), 0);
        assert_eq!(ranges(10).collect::<Vec<_>>(), vec![(0, 10)]);

        let big: Vec<_> = ranges(MAX_RANGE_BYTES * 2 + 1).collect();
        assert_eq!(
            big,
            vec![
                (0, MAX_RANGE_BYTES),
                (MAX_RANGE_BYTES, MAX_RANGE_BYTES * 2),
                (MAX_RANGE_BYTES * 2, MAX_RANGE_BYTES * 2 + 1),
            ]
        );
    }

    #[test]
    fn test_parse_listing_kinds_and_marker() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.file.core.windows.net/" ShareName="contracts" DirectoryPath="dummycontracts">
  <Marker />
  <Entries>
    <File>
      <FileId>13835128424026341376</FileId>
      <Name>abc_terms &amp; conditions.pdf</Name>
      <Properties><Content-Length>1024</Content-Length></Properties>
    </File>
    <Directory>
      <FileId>13835093239654252544</FileId>
      <Name>archive</Name>
      <Properties />
    </Directory>
  </Entries>
  <NextMarker>2!8!bWFya2Vy</NextMarker>
</EnumerationResults>"#;

        let page = parse_listing(body);
        assert_eq!(
            page.entries,
            vec![
                DirectoryEntry {
                    name: "abc_terms & conditions.pdf".to_owned(),
                    kind: EntryKind::File,
                },
                DirectoryEntry {
                    name: "archive".to_owned(),
                    kind: EntryKind::Directory,
                },
            ]
        );
        assert_eq!(page.next_marker.as_deref(), Some("2!8!bWFya2Vy"));
    }

    #[test]
    fn test_parse_listing_last_page() {
        let body = "<EnumerationResults><Entries /><NextMarker /></EnumerationResults>";
        let page = parse_listing(body);
        assert!(page.entries.is_empty());
        assert!(page.next_marker.is_none());
    }
}

//! In-process storage backends.
//!
//! Each type mirrors the observable behavior of its Azure counterpart that
//! the facade relies on: idempotent creation, 404s for unprovisioned
//! resources, paged listings, and receive-then-delete queue semantics with a
//! visibility window. They keep everything in memory and are meant for tests
//! and local runs without a storage account.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use abc_retail_core::new_row_key;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;

use super::{
    BlobStore, ContainerAccess, ContinuationToken, DirectoryEntry, DirectoryPage, Entity,
    EntityPage, EntityStore, EntryKind, FileShare, MessageQueue, ReceivedMessage, StorageBackends,
    StorageError, StorageResult,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(code: &str, what: &str) -> StorageError {
    StorageError::Service {
        status: 404,
        code: code.to_owned(),
        message: format!("{what} does not exist"),
    }
}

/// Build a complete set of in-memory backends.
#[must_use]
pub fn backends() -> StorageBackends {
    StorageBackends {
        entities: Arc::new(MemoryEntityStore::default()),
        blobs: Arc::new(MemoryBlobStore::default()),
        queue: Arc::new(MemoryQueue::default()),
        files: Arc::new(MemoryFileShare::default()),
    }
}

// =============================================================================
// Tables
// =============================================================================

type TableRows = BTreeMap<(String, String), Entity>;

/// Tables held in sorted maps, scanned in `(PartitionKey, RowKey)` order.
#[derive(Debug)]
pub struct MemoryEntityStore {
    tables: Mutex<HashMap<String, TableRows>>,
    page_size: usize,
}

impl MemoryEntityStore {
    /// Matches the service's maximum page size.
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    /// A store that returns at most `page_size` rows per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }
}

impl Default for MemoryEntityStore {
    fn default() -> Self {
        Self::with_page_size(Self::DEFAULT_PAGE_SIZE)
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn create_table_if_not_exists(&self, table: &str) -> StorageResult<()> {
        lock(&self.tables).entry(table.to_owned()).or_default();
        Ok(())
    }

    async fn insert_or_replace(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        mut entity: Entity,
    ) -> StorageResult<()> {
        let mut tables = lock(&self.tables);
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| not_found("TableNotFound", table))?;

        entity.insert("PartitionKey".to_owned(), Value::from(partition_key));
        entity.insert("RowKey".to_owned(), Value::from(row_key));
        entity.insert("Timestamp".to_owned(), Value::from(Utc::now().to_rfc3339()));
        rows.insert((partition_key.to_owned(), row_key.to_owned()), entity);
        Ok(())
    }

    async fn query_page(
        &self,
        table: &str,
        continuation: Option<ContinuationToken>,
    ) -> StorageResult<EntityPage> {
        let tables = lock(&self.tables);
        let rows = tables
            .get(table)
            .ok_or_else(|| not_found("TableNotFound", table))?;

        let start = continuation.map(|token| {
            (
                token.next_partition_key,
                token.next_row_key.unwrap_or_default(),
            )
        });
        let mut remaining = rows
            .iter()
            .filter(|(key, _)| start.as_ref().is_none_or(|start| *key >= start));

        let entities: Vec<Entity> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(_, entity)| entity.clone())
            .collect();
        let continuation = remaining.next().map(|((pk, rk), _)| ContinuationToken {
            next_partition_key: pk.clone(),
            next_row_key: Some(rk.clone()),
        });

        Ok(EntityPage {
            entities,
            continuation,
        })
    }
}

// =============================================================================
// Blobs
// =============================================================================

/// Containers of blobs keyed by name.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    containers: Mutex<HashMap<String, HashMap<String, Bytes>>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create_container_if_not_exists(
        &self,
        container: &str,
        _access: ContainerAccess,
    ) -> StorageResult<()> {
        lock(&self.containers)
            .entry(container.to_owned())
            .or_default();
        Ok(())
    }

    async fn upload_blob(
        &self,
        container: &str,
        name: &str,
        content: Bytes,
        _content_type: Option<&str>,
    ) -> StorageResult<()> {
        lock(&self.containers)
            .get_mut(container)
            .ok_or_else(|| not_found("ContainerNotFound", container))?
            .insert(name.to_owned(), content);
        Ok(())
    }

    async fn download_blob(&self, container: &str, name: &str) -> StorageResult<Option<Bytes>> {
        Ok(lock(&self.containers)
            .get(container)
            .ok_or_else(|| not_found("ContainerNotFound", container))?
            .get(name)
            .cloned())
    }

    fn blob_url(&self, container: &str, name: &str) -> StorageResult<String> {
        Ok(format!(
            "memory://{container}/{}",
            urlencoding::encode(name)
        ))
    }

    fn signed_read_url(
        &self,
        container: &str,
        name: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        let expiry = Utc::now() + ttl;
        Ok(format!(
            "{}?sp=r&se={}",
            self.blob_url(container, name)?,
            urlencoding::encode(&expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        ))
    }
}

// =============================================================================
// Queue
// =============================================================================

#[derive(Debug)]
struct StoredMessage {
    id: String,
    text: String,
    pop_receipt: Option<String>,
    visible_at: Instant,
    dequeue_count: u32,
}

/// FIFO queues with a visibility window after each receive.
#[derive(Debug)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<StoredMessage>>>,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    /// Matches the service's default visibility timeout.
    pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

    /// A queue that hides received messages for `visibility_timeout`.
    #[must_use]
    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            visibility_timeout,
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::with_visibility_timeout(Self::DEFAULT_VISIBILITY_TIMEOUT)
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn create_queue_if_not_exists(&self, queue: &str) -> StorageResult<()> {
        lock(&self.queues).entry(queue.to_owned()).or_default();
        Ok(())
    }

    async fn send_message(&self, queue: &str, text: &str) -> StorageResult<()> {
        lock(&self.queues)
            .get_mut(queue)
            .ok_or_else(|| not_found("QueueNotFound", queue))?
            .push_back(StoredMessage {
                id: new_row_key(),
                text: text.to_owned(),
                pop_receipt: None,
                visible_at: Instant::now(),
                dequeue_count: 0,
            });
        Ok(())
    }

    async fn receive_message(&self, queue: &str) -> StorageResult<Option<ReceivedMessage>> {
        let mut queues = lock(&self.queues);
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| not_found("QueueNotFound", queue))?;

        let now = Instant::now();
        let Some(message) = messages.iter_mut().find(|m| m.visible_at <= now) else {
            return Ok(None);
        };

        let pop_receipt = new_row_key();
        message.pop_receipt = Some(pop_receipt.clone());
        message.visible_at = now + self.visibility_timeout;
        message.dequeue_count += 1;

        Ok(Some(ReceivedMessage {
            message_id: message.id.clone(),
            pop_receipt,
            text: message.text.clone(),
            dequeue_count: message.dequeue_count,
        }))
    }

    async fn delete_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> StorageResult<()> {
        let mut queues = lock(&self.queues);
        let messages = queues
            .get_mut(queue)
            .ok_or_else(|| not_found("QueueNotFound", queue))?;

        let position = messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| not_found("MessageNotFound", message_id))?;
        if messages
            .get(position)
            .and_then(|m| m.pop_receipt.as_deref())
            != Some(pop_receipt)
        {
            return Err(StorageError::Service {
                status: 400,
                code: "PopReceiptMismatch".to_owned(),
                message: "pop receipt does not match the latest receive".to_owned(),
            });
        }
        messages.remove(position);
        Ok(())
    }
}

// =============================================================================
// Files
// =============================================================================

#[derive(Debug, Clone)]
enum Node {
    Directory,
    File(Vec<u8>),
}

/// File shares as flat maps from `/`-separated paths to nodes.
#[derive(Debug)]
pub struct MemoryFileShare {
    shares: Mutex<HashMap<String, BTreeMap<String, Node>>>,
    page_size: usize,
}

impl MemoryFileShare {
    /// Matches the service's maximum listing page size.
    pub const DEFAULT_PAGE_SIZE: usize = 5000;

    /// A share that lists at most `page_size` entries per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            shares: Mutex::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Read a file's content directly.
    #[must_use]
    pub fn read_file(&self, share: &str, directory: &str, name: &str) -> Option<Bytes> {
        match lock(&self.shares).get(share)?.get(&join(directory, name))? {
            Node::File(content) => Some(Bytes::copy_from_slice(content)),
            Node::Directory => None,
        }
    }
}

impl Default for MemoryFileShare {
    fn default() -> Self {
        Self::with_page_size(Self::DEFAULT_PAGE_SIZE)
    }
}

fn join(directory: &str, name: &str) -> String {
    format!("{}/{name}", directory.trim_matches('/'))
}

fn parent_exists(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
    path.rsplit_once('/')
        .is_none_or(|(parent, _)| matches!(nodes.get(parent), Some(Node::Directory)))
}

#[async_trait]
impl FileShare for MemoryFileShare {
    async fn create_share_if_not_exists(&self, share: &str) -> StorageResult<()> {
        lock(&self.shares).entry(share.to_owned()).or_default();
        Ok(())
    }

    async fn create_directory_if_not_exists(
        &self,
        share: &str,
        directory: &str,
    ) -> StorageResult<()> {
        let mut shares = lock(&self.shares);
        let nodes = shares
            .get_mut(share)
            .ok_or_else(|| not_found("ShareNotFound", share))?;
        let path = directory.trim_matches('/').to_owned();
        if !parent_exists(nodes, &path) {
            return Err(not_found("ParentNotFound", &path));
        }
        nodes.entry(path).or_insert(Node::Directory);
        Ok(())
    }

    async fn create_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StorageResult<()> {
        let mut shares = lock(&self.shares);
        let nodes = shares
            .get_mut(share)
            .ok_or_else(|| not_found("ShareNotFound", share))?;
        let path = join(directory, name);
        if !parent_exists(nodes, &path) {
            return Err(not_found("ParentNotFound", directory));
        }
        let length = usize::try_from(length)
            .map_err(|_| StorageError::Malformed(format!("file length {length} too large")))?;
        nodes.insert(path, Node::File(vec![0; length]));
        Ok(())
    }

    async fn write_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        content: Bytes,
    ) -> StorageResult<()> {
        let mut shares = lock(&self.shares);
        let path = join(directory, name);
        let node = shares
            .get_mut(share)
            .ok_or_else(|| not_found("ShareNotFound", share))?
            .get_mut(&path)
            .ok_or_else(|| not_found("ResourceNotFound", &path))?;
        let Node::File(data) = node else {
            return Err(not_found("ResourceNotFound", &path));
        };
        let Some(target) = data.get_mut(..content.len()) else {
            return Err(StorageError::Service {
                status: 416,
                code: "InvalidRange".to_owned(),
                message: format!("{} bytes exceed the file length", content.len()),
            });
        };
        target.copy_from_slice(&content);
        Ok(())
    }

    async fn list_directory_page(
        &self,
        share: &str,
        directory: &str,
        marker: Option<String>,
    ) -> StorageResult<DirectoryPage> {
        let shares = lock(&self.shares);
        let nodes = shares
            .get(share)
            .ok_or_else(|| not_found("ShareNotFound", share))?;
        let directory = directory.trim_matches('/');
        if !matches!(nodes.get(directory), Some(Node::Directory)) {
            return Err(not_found("ResourceNotFound", directory));
        }

        let prefix = format!("{directory}/");
        let mut children = nodes.iter().filter_map(|(path, node)| {
            let name = path.strip_prefix(&prefix)?;
            if name.contains('/') {
                return None;
            }
            if marker.as_deref().is_some_and(|marker| name < marker) {
                return None;
            }
            let kind = match node {
                Node::Directory => EntryKind::Directory,
                Node::File(_) => EntryKind::File,
            };
            Some(DirectoryEntry {
                name: name.to_owned(),
                kind,
            })
        });

        let entries: Vec<DirectoryEntry> = children.by_ref().take(self.page_size).collect();
        let next_marker = children.next().map(|entry| entry.name);
        Ok(DirectoryPage {
            entries,
            next_marker,
        })
    }
}

//! Storage account access.
//!
//! # Architecture
//!
//! - One capability trait per storage primitive: [`EntityStore`] (tables),
//!   [`BlobStore`] (blobs), [`MessageQueue`] (queues), [`FileShare`] (files)
//! - [`StorageFacade`] owns one handle per primitive and exposes the
//!   operations the request handlers need, one storage call each
//! - [`azure`] implements the traits over the Azure Storage REST APIs
//! - [`memory`] implements them in process, for tests and local runs
//!
//! # Example
//!
//! ```rust,ignore
//! use abc_retail_web::storage::{azure::AzureStorage, ImageUrlPolicy, StorageFacade};
//!
//! let backends = AzureStorage::new(&connection_string)?.into_backends();
//! let storage = StorageFacade::initialize(backends, ImageUrlPolicy::default()).await?;
//!
//! storage.enqueue_message("order-123").await?;
//! assert_eq!(storage.receive_and_delete_next_message().await?.as_deref(), Some("order-123"));
//! ```

pub mod azure;
mod facade;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use facade::{ImageUrlPolicy, StorageFacade};

/// Blob container for product images.
pub const IMAGES_CONTAINER: &str = "images";
/// Queue carrying order messages.
pub const ORDER_QUEUE: &str = "order-queue";
/// File share holding contracts.
pub const CONTRACTS_SHARE: &str = "contracts";
/// Directory inside [`CONTRACTS_SHARE`] that uploads go to.
pub const CONTRACTS_DIRECTORY: &str = "dummycontracts";

/// Errors that can occur when talking to the storage account.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The account could not be reached.
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service rejected the request.
    #[error("storage service returned {status} ({code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// The service answered with something we could not interpret.
    #[error("malformed storage response: {0}")]
    Malformed(String),

    /// A record could not be converted to or from a table entity.
    #[error("entity conversion failed: {0}")]
    Entity(#[from] serde_json::Error),

    /// The connection string is missing parts or is malformed.
    #[error("invalid connection string: {0}")]
    ConnectionString(String),
}

/// Error codes the services return when a create targets an existing
/// resource. Other 409s (a resource being deleted, public access disabled on
/// the account) are real failures.
const ALREADY_EXISTS_CODES: [&str; 5] = [
    "TableAlreadyExists",
    "ContainerAlreadyExists",
    "QueueAlreadyExists",
    "ShareAlreadyExists",
    "ResourceAlreadyExists",
];

impl StorageError {
    /// Whether this is the service's answer to creating something that
    /// already exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Service { status: 409, code, .. } if ALREADY_EXISTS_CODES.contains(&code.as_str())
        )
    }

    /// Whether the service reported the target as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Service { status: 404, .. })
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Treat "already exists" as success, for idempotent provisioning.
pub(crate) fn ignore_conflict(result: StorageResult<()>) -> StorageResult<()> {
    match result {
        Err(e) if e.is_already_exists() => Ok(()),
        other => other,
    }
}

// =============================================================================
// Entity store
// =============================================================================

/// A schema-less table row: property name to JSON value.
pub type Entity = serde_json::Map<String, serde_json::Value>;

/// Cursor returned by a paged table query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub next_partition_key: String,
    pub next_row_key: Option<String>,
}

/// One page of a table scan.
#[derive(Debug, Clone, Default)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    /// Present when more rows remain.
    pub continuation: Option<ContinuationToken>,
}

/// Tables keyed by `(PartitionKey, RowKey)`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Create `table` unless it exists.
    async fn create_table_if_not_exists(&self, table: &str) -> StorageResult<()>;

    /// Insert the entity or replace the whole row with the same keys.
    async fn insert_or_replace(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        entity: Entity,
    ) -> StorageResult<()>;

    /// Fetch one page of an unfiltered scan, starting at `continuation`.
    async fn query_page(
        &self,
        table: &str,
        continuation: Option<ContinuationToken>,
    ) -> StorageResult<EntityPage>;
}

// =============================================================================
// Blob store
// =============================================================================

/// Anonymous access level for a blob container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerAccess {
    /// Blobs need a signed URL or account credentials.
    #[default]
    Private,
    /// Anyone with a blob's URL can read it.
    PublicBlob,
}

/// Named byte objects grouped into containers.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create `container` unless it exists.
    async fn create_container_if_not_exists(
        &self,
        container: &str,
        access: ContainerAccess,
    ) -> StorageResult<()>;

    /// Write `content` to `name`, overwriting unconditionally.
    async fn upload_blob(
        &self,
        container: &str,
        name: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()>;

    /// Read a blob back, or `None` if it does not exist.
    async fn download_blob(&self, container: &str, name: &str) -> StorageResult<Option<Bytes>>;

    /// The blob's plain URL.
    fn blob_url(&self, container: &str, name: &str) -> StorageResult<String>;

    /// A URL granting read access to the blob for `ttl`.
    fn signed_read_url(&self, container: &str, name: &str, ttl: Duration)
    -> StorageResult<String>;
}

// =============================================================================
// Message queue
// =============================================================================

/// A message handed out by [`MessageQueue::receive_message`].
///
/// The message stays invisible to other receivers for the visibility window
/// and must be deleted with `pop_receipt` before that window closes, or it
/// is delivered again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub pop_receipt: String,
    pub text: String,
    /// How many times the message has been received, including this one.
    pub dequeue_count: u32,
}

/// At-least-once message queues.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Create `queue` unless it exists.
    async fn create_queue_if_not_exists(&self, queue: &str) -> StorageResult<()>;

    /// Append `text` to the queue.
    async fn send_message(&self, queue: &str, text: &str) -> StorageResult<()>;

    /// Receive at most one message, hiding it for the visibility window.
    async fn receive_message(&self, queue: &str) -> StorageResult<Option<ReceivedMessage>>;

    /// Delete a received message.
    async fn delete_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
    ) -> StorageResult<()>;
}

// =============================================================================
// File share
// =============================================================================

/// Kind of entry in a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// One page of a directory listing.
#[derive(Debug, Clone, Default)]
pub struct DirectoryPage {
    pub entries: Vec<DirectoryEntry>,
    /// Present when more entries remain.
    pub next_marker: Option<String>,
}

/// Network file shares with directories and files.
#[async_trait]
pub trait FileShare: Send + Sync {
    /// Create `share` unless it exists.
    async fn create_share_if_not_exists(&self, share: &str) -> StorageResult<()>;

    /// Create `directory` inside `share` unless it exists.
    async fn create_directory_if_not_exists(&self, share: &str, directory: &str)
    -> StorageResult<()>;

    /// Create (or truncate) a file of exactly `length` bytes.
    async fn create_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        length: u64,
    ) -> StorageResult<()>;

    /// Write `content` from offset zero into a file created with its length.
    async fn write_file(
        &self,
        share: &str,
        directory: &str,
        name: &str,
        content: Bytes,
    ) -> StorageResult<()>;

    /// Fetch one page of a directory listing, starting at `marker`.
    async fn list_directory_page(
        &self,
        share: &str,
        directory: &str,
        marker: Option<String>,
    ) -> StorageResult<DirectoryPage>;
}

/// One handle per storage primitive, shared by every request.
#[derive(Clone)]
pub struct StorageBackends {
    pub entities: Arc<dyn EntityStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub queue: Arc<dyn MessageQueue>,
    pub files: Arc<dyn FileShare>,
}

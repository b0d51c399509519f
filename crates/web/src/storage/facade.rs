//! The storage facade used by request handlers.

use std::time::Duration;

use abc_retail_core::{CustomerRecord, ProductRecord, TableRecord};
use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{
    CONTRACTS_DIRECTORY, CONTRACTS_SHARE, ContainerAccess, Entity, EntryKind, IMAGES_CONTAINER,
    ORDER_QUEUE, StorageBackends, StorageError, StorageResult,
};

/// How uploaded product images are referenced from product records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageUrlPolicy {
    /// Private container; references are read-only signed URLs valid for `ttl`.
    Signed { ttl: Duration },
    /// Publicly readable container; references are plain blob URLs.
    Public,
}

impl ImageUrlPolicy {
    /// Validity of signed image URLs.
    pub const DEFAULT_SIGNED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    const fn container_access(self) -> ContainerAccess {
        match self {
            Self::Signed { .. } => ContainerAccess::Private,
            Self::Public => ContainerAccess::PublicBlob,
        }
    }
}

impl Default for ImageUrlPolicy {
    fn default() -> Self {
        Self::Signed {
            ttl: Self::DEFAULT_SIGNED_TTL,
        }
    }
}

/// Storage operations behind the web handlers.
///
/// Holds only immutable handles, so one instance is shared by every request.
/// Each operation is a single call (or a single paged scan) against the
/// account with no retries: failures surface to the caller as-is.
pub struct StorageFacade {
    backends: StorageBackends,
    image_urls: ImageUrlPolicy,
}

impl std::fmt::Debug for StorageFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFacade")
            .field("image_urls", &self.image_urls)
            .finish_non_exhaustive()
    }
}

impl StorageFacade {
    /// Provision every table, container, queue, share and directory the
    /// application uses, then return the facade.
    ///
    /// Provisioning is idempotent and runs on every start.
    ///
    /// # Errors
    ///
    /// Returns the first provisioning failure; no facade exists until all of
    /// them succeed.
    #[instrument(skip(backends))]
    pub async fn initialize(
        backends: StorageBackends,
        image_urls: ImageUrlPolicy,
    ) -> StorageResult<Self> {
        backends
            .entities
            .create_table_if_not_exists(CustomerRecord::TABLE)
            .await?;
        backends
            .entities
            .create_table_if_not_exists(ProductRecord::TABLE)
            .await?;
        backends
            .blobs
            .create_container_if_not_exists(IMAGES_CONTAINER, image_urls.container_access())
            .await?;
        backends.queue.create_queue_if_not_exists(ORDER_QUEUE).await?;
        backends
            .files
            .create_share_if_not_exists(CONTRACTS_SHARE)
            .await?;
        backends
            .files
            .create_directory_if_not_exists(CONTRACTS_SHARE, CONTRACTS_DIRECTORY)
            .await?;

        info!("Storage resources provisioned");
        Ok(Self {
            backends,
            image_urls,
        })
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Insert or replace a customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be written.
    pub async fn upsert_customer(&self, customer: &CustomerRecord) -> StorageResult<()> {
        self.upsert(customer).await
    }

    /// Every customer, across all pages. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be read.
    pub async fn list_customers(&self) -> StorageResult<Vec<CustomerRecord>> {
        self.list().await
    }

    /// Lazy page-by-page scan of the customers table.
    pub fn customer_pages(
        &self,
    ) -> impl Stream<Item = StorageResult<Vec<CustomerRecord>>> + Send + '_ {
        self.pages()
    }

    /// Insert or replace a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be written.
    pub async fn upsert_product(&self, product: &ProductRecord) -> StorageResult<()> {
        self.upsert(product).await
    }

    /// Every product, across all pages. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be read.
    pub async fn list_products(&self) -> StorageResult<Vec<ProductRecord>> {
        self.list().await
    }

    /// Lazy page-by-page scan of the products table.
    pub fn product_pages(&self) -> impl Stream<Item = StorageResult<Vec<ProductRecord>>> + Send + '_ {
        self.pages()
    }

    #[instrument(skip(self, record), fields(table = R::TABLE, row_key = record.row_key()))]
    async fn upsert<R: TableRecord>(&self, record: &R) -> StorageResult<()> {
        let Value::Object(entity) = serde_json::to_value(record)? else {
            return Err(StorageError::Malformed(format!(
                "{} record did not serialize to an object",
                R::TABLE
            )));
        };
        self.backends
            .entities
            .insert_or_replace(R::TABLE, record.partition_key(), record.row_key(), entity)
            .await
    }

    /// Scan `R::TABLE` from the start, one page per item.
    ///
    /// Each call starts a fresh scan. Rows written by other applications
    /// that do not convert to `R` are logged and left out.
    fn pages<R: TableRecord>(&self) -> impl Stream<Item = StorageResult<Vec<R>>> + Send + '_ {
        try_stream! {
            let mut continuation = None;
            loop {
                let page = self
                    .backends
                    .entities
                    .query_page(R::TABLE, continuation)
                    .await?;
                let records: Vec<R> = page
                    .entities
                    .into_iter()
                    .filter_map(readable::<R>)
                    .collect();
                yield records;

                match page.continuation {
                    Some(next) => continuation = Some(next),
                    None => break,
                }
            }
        }
    }

    // Full scan with no filter or limit; latency grows with the table.
    #[instrument(skip(self), fields(table = R::TABLE))]
    async fn list<R: TableRecord>(&self) -> StorageResult<Vec<R>> {
        let records: Vec<R> = self.pages::<R>().try_concat().await?;
        debug!(count = records.len(), "Table scanned");
        Ok(records)
    }

    // =========================================================================
    // Blobs
    // =========================================================================

    /// Store a product image under `name`, overwriting any existing blob,
    /// and return the reference to save on the product.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails or a signed URL cannot be built.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn upload_image(
        &self,
        name: &str,
        content: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        self.backends
            .blobs
            .upload_blob(IMAGES_CONTAINER, name, content, content_type)
            .await?;

        match self.image_urls {
            ImageUrlPolicy::Signed { ttl } => {
                self.backends
                    .blobs
                    .signed_read_url(IMAGES_CONTAINER, name, ttl)
            }
            ImageUrlPolicy::Public => self.backends.blobs.blob_url(IMAGES_CONTAINER, name),
        }
    }

    /// Read a product image back.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob store cannot be read.
    #[instrument(skip(self))]
    pub async fn download_image(&self, name: &str) -> StorageResult<Option<Bytes>> {
        self.backends
            .blobs
            .download_blob(IMAGES_CONTAINER, name)
            .await
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Append an order message to the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn enqueue_message(&self, text: &str) -> StorageResult<()> {
        self.backends.queue.send_message(ORDER_QUEUE, text).await
    }

    /// Take the next order message off the queue.
    ///
    /// Receives one message, then deletes it with the receipt from that
    /// receive. If the process dies between the two calls the message
    /// becomes visible again and is delivered to a later caller: delivery is
    /// at-least-once.
    ///
    /// # Errors
    ///
    /// Returns an error if either call fails. A failed delete leaves the
    /// message to reappear.
    #[instrument(skip(self))]
    pub async fn receive_and_delete_next_message(&self) -> StorageResult<Option<String>> {
        let Some(message) = self.backends.queue.receive_message(ORDER_QUEUE).await? else {
            return Ok(None);
        };

        self.backends
            .queue
            .delete_message(ORDER_QUEUE, &message.message_id, &message.pop_receipt)
            .await?;

        debug!(
            message_id = %message.message_id,
            dequeue_count = message.dequeue_count,
            "Order message processed"
        );
        Ok(Some(message.text))
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Store a contract file in the contracts directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn upload_contract(&self, name: &str, content: Bytes) -> StorageResult<()> {
        let files = &self.backends.files;
        files
            .create_file(
                CONTRACTS_SHARE,
                CONTRACTS_DIRECTORY,
                name,
                content.len() as u64,
            )
            .await?;
        files
            .write_file(CONTRACTS_SHARE, CONTRACTS_DIRECTORY, name, content)
            .await
    }

    /// Names of the files (not subdirectories) in the contracts directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any listing page cannot be read.
    #[instrument(skip(self))]
    pub async fn list_contracts(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        let mut marker = None;
        loop {
            let page = self
                .backends
                .files
                .list_directory_page(CONTRACTS_SHARE, CONTRACTS_DIRECTORY, marker)
                .await?;
            names.extend(
                page.entries
                    .into_iter()
                    .filter(|entry| entry.kind == EntryKind::File)
                    .map(|entry| entry.name),
            );
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(names)
    }
}

fn from_entity<R: TableRecord>(entity: Entity) -> StorageResult<R> {
    Ok(serde_json::from_value(Value::Object(entity))?)
}

fn readable<R: TableRecord>(entity: Entity) -> Option<R> {
    let row_key = entity
        .get("RowKey")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    match from_entity::<R>(entity) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(table = R::TABLE, %row_key, error = %e, "Skipping unreadable row");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use abc_retail_core::{CustomerRecord, Price, ProductRecord, new_row_key};
    use futures::StreamExt;
    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::{EntityStore, FileShare};
    use crate::storage::memory::{
        MemoryBlobStore, MemoryEntityStore, MemoryFileShare, MemoryQueue,
    };

    fn backends(page_size: usize) -> (StorageBackends, Arc<MemoryFileShare>) {
        let files = Arc::new(MemoryFileShare::default());
        let backends = StorageBackends {
            entities: Arc::new(MemoryEntityStore::with_page_size(page_size)),
            blobs: Arc::new(MemoryBlobStore::default()),
            queue: Arc::new(MemoryQueue::default()),
            files: files.clone(),
        };
        (backends, files)
    }

    async fn facade(page_size: usize) -> StorageFacade {
        let (backends, _) = backends(page_size);
        StorageFacade::initialize(backends, ImageUrlPolicy::default())
            .await
            .unwrap()
    }

    fn customer(name: &str) -> CustomerRecord {
        CustomerRecord::new(
            new_row_key(),
            Some(name.to_owned()),
            Some(format!("{name}@example.com")),
            None,
        )
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (backends, _) = backends(10);
        StorageFacade::initialize(backends.clone(), ImageUrlPolicy::Public)
            .await
            .unwrap();
        StorageFacade::initialize(backends, ImageUrlPolicy::Public)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_tables_list_empty() {
        let storage = facade(10).await;
        assert!(storage.list_customers().await.unwrap().is_empty());
        assert!(storage.list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_then_list_customer() {
        let storage = facade(10).await;
        let jane = customer("jane");
        storage.upsert_customer(&jane).await.unwrap();

        let customers = storage.list_customers().await.unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].partition_key, jane.partition_key);
        assert_eq!(customers[0].row_key, jane.row_key);
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_row() {
        let storage = facade(10).await;
        let mut jane = customer("jane");
        jane.address = Some("1 Main St".to_owned());
        storage.upsert_customer(&jane).await.unwrap();

        jane.address = None;
        jane.name = Some("Jane Doe".to_owned());
        storage.upsert_customer(&jane).await.unwrap();

        let customers = storage.list_customers().await.unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].name.as_deref(), Some("Jane Doe"));
        assert!(customers[0].address.is_none());
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let storage = facade(2).await;
        for i in 0..5 {
            storage.upsert_customer(&customer(&format!("c{i}"))).await.unwrap();
        }

        let page_sizes: Vec<usize> = storage
            .customer_pages()
            .map(|page| page.unwrap().len())
            .collect()
            .await;
        assert_eq!(page_sizes, vec![2, 2, 1]);
        assert_eq!(storage.list_customers().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_product_scenario() {
        let storage = facade(10).await;
        let lamp = ProductRecord {
            partition_key: "Electronics".to_owned(),
            row_key: new_row_key(),
            name: Some("Lamp".to_owned()),
            description: None,
            price: Price::new(Decimal::new(1999, 2)).unwrap(),
            image_url: None,
            timestamp: None,
        };
        storage.upsert_product(&lamp).await.unwrap();

        let products = storage.list_products().await.unwrap();
        let found = products
            .iter()
            .find(|p| p.row_key == lamp.row_key)
            .unwrap();
        assert_eq!(found.name.as_deref(), Some("Lamp"));
        assert_eq!(found.price.amount(), Decimal::new(1999, 2));
        assert_eq!(found.category(), "Electronics");
    }

    #[tokio::test]
    async fn test_rows_from_other_writers_do_not_break_listing() {
        let (backends, _) = backends(10);
        let entities = Arc::clone(&backends.entities);
        let storage = StorageFacade::initialize(backends, ImageUrlPolicy::default())
            .await
            .unwrap();

        let lamp = ProductRecord {
            partition_key: "Electronics".to_owned(),
            row_key: new_row_key(),
            name: Some("Lamp".to_owned()),
            description: None,
            price: Price::new(Decimal::new(1999, 2)).unwrap(),
            image_url: None,
            timestamp: None,
        };
        storage.upsert_product(&lamp).await.unwrap();

        let legacy = serde_json::json!({ "ProductName": "Old", "Price": -1.0 });
        entities
            .insert_or_replace(
                ProductRecord::TABLE,
                "Electronics",
                "legacy",
                legacy.as_object().cloned().unwrap(),
            )
            .await
            .unwrap();
        let broken = serde_json::json!({ "ProductName": "Broken", "Price": true });
        entities
            .insert_or_replace(
                ProductRecord::TABLE,
                "Electronics",
                "broken",
                broken.as_object().cloned().unwrap(),
            )
            .await
            .unwrap();

        let products = storage.list_products().await.unwrap();
        assert_eq!(products.len(), 2);
        let old = products.iter().find(|p| p.row_key == "legacy").unwrap();
        assert_eq!(old.price.amount(), Decimal::new(-1, 0));
        assert!(products.iter().any(|p| p.row_key == lamp.row_key));
        assert!(products.iter().all(|p| p.row_key != "broken"));
    }

    #[tokio::test]
    async fn test_queue_scenario() {
        let storage = facade(10).await;
        storage.enqueue_message("order-123").await.unwrap();

        assert_eq!(
            storage.receive_and_delete_next_message().await.unwrap(),
            Some("order-123".to_owned())
        );
        assert_eq!(storage.receive_and_delete_next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_queue_is_fifo_for_single_consumer() {
        let storage = facade(10).await;
        storage.enqueue_message("first").await.unwrap();
        storage.enqueue_message("second").await.unwrap();

        let first = storage.receive_and_delete_next_message().await.unwrap();
        let second = storage.receive_and_delete_next_message().await.unwrap();
        assert_eq!(first.as_deref(), Some("first"));
        assert_eq!(second.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_image_upload_round_trip() {
        let storage = facade(10).await;
        let bytes = Bytes::from_static(b"\x89PNG fake image");
        let reference = storage
            .upload_image("abc_lamp.png", bytes.clone(), Some("image/png"))
            .await
            .unwrap();

        assert!(reference.contains("abc_lamp.png"));
        assert_eq!(
            storage.download_image("abc_lamp.png").await.unwrap(),
            Some(bytes)
        );
        assert_eq!(storage.download_image("missing.png").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_image_reference_follows_policy() {
        let (backends, _) = backends(10);
        let public = StorageFacade::initialize(backends.clone(), ImageUrlPolicy::Public)
            .await
            .unwrap();
        let signed = StorageFacade::initialize(backends, ImageUrlPolicy::default())
            .await
            .unwrap();

        let plain = public
            .upload_image("a.png", Bytes::from_static(b"a"), None)
            .await
            .unwrap();
        let with_signature = signed
            .upload_image("a.png", Bytes::from_static(b"a"), None)
            .await
            .unwrap();

        assert!(!plain.contains('?'));
        assert!(with_signature.starts_with(&plain));
        assert!(with_signature.contains("se="));
    }

    #[tokio::test]
    async fn test_contracts_list_files_only() {
        let (backends, files) = backends(10);
        let storage = StorageFacade::initialize(backends, ImageUrlPolicy::default())
            .await
            .unwrap();
        files
            .create_directory_if_not_exists(
                CONTRACTS_SHARE,
                &format!("{CONTRACTS_DIRECTORY}/archive"),
            )
            .await
            .unwrap();

        storage
            .upload_contract("abc_terms.pdf", Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();

        let names = storage.list_contracts().await.unwrap();
        assert_eq!(names, vec!["abc_terms.pdf".to_owned()]);
        assert_eq!(
            files.read_file(CONTRACTS_SHARE, CONTRACTS_DIRECTORY, "abc_terms.pdf"),
            Some(Bytes::from_static(b"%PDF-1.7"))
        );
    }

    #[tokio::test]
    async fn test_operations_fail_without_provisioning() {
        let (backends, _) = backends(10);
        let storage = StorageFacade {
            backends,
            image_urls: ImageUrlPolicy::Public,
        };
        let err = storage.list_customers().await.unwrap_err();
        assert!(err.is_not_found());
        assert!(storage.enqueue_message("x").await.unwrap_err().is_not_found());
    }
}

//! Table records stored in the entity store.
//!
//! Field names on the wire are the table's property names (`PartitionKey`,
//! `RowKey`, `CustomerName`, ...). The service-maintained `Timestamp` is read
//! back when present and never written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::price::Price;

/// Partition key shared by every customer row.
pub const CUSTOMERS_PARTITION: &str = "Customers";

/// Partition key for products submitted without a category.
pub const DEFAULT_PRODUCT_CATEGORY: &str = "Products";

/// A record that lives in one entity-store table.
///
/// Identity is the `(partition_key, row_key)` pair, unique within
/// [`TableRecord::TABLE`].
pub trait TableRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the table holding records of this type.
    const TABLE: &'static str;

    /// The partition half of the identity.
    fn partition_key(&self) -> &str;

    /// The row half of the identity.
    fn row_key(&self) -> &str;
}

/// A customer row in the `Customers` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerRecord {
    pub partition_key: String,
    pub row_key: String,
    #[serde(rename = "CustomerName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Last-modified time assigned by the entity store.
    #[serde(default, skip_serializing)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CustomerRecord {
    /// Create a customer in the shared [`CUSTOMERS_PARTITION`].
    #[must_use]
    pub fn new(
        row_key: String,
        name: Option<String>,
        email: Option<String>,
        address: Option<String>,
    ) -> Self {
        Self {
            partition_key: CUSTOMERS_PARTITION.to_owned(),
            row_key,
            name,
            email,
            address,
            timestamp: None,
        }
    }
}

impl TableRecord for CustomerRecord {
    const TABLE: &'static str = "Customers";

    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

/// A product row in the `Products` table, partitioned by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductRecord {
    /// Product category.
    pub partition_key: String,
    pub row_key: String,
    #[serde(rename = "ProductName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Price,
    /// Reference to the product image in blob storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Last-modified time assigned by the entity store.
    #[serde(default, skip_serializing)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProductRecord {
    /// Category this product is filed under.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.partition_key
    }
}

impl TableRecord for ProductRecord {
    const TABLE: &'static str = "Products";

    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

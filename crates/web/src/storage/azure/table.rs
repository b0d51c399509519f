//! Table service client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

use super::ServiceClient;
use crate::storage::{
    ContinuationToken, Entity, EntityPage, EntityStore, StorageResult, ignore_conflict,
};

const NEXT_PARTITION_KEY: &str = "x-ms-continuation-NextPartitionKey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-NextRowKey";

/// [`EntityStore`] backed by Azure Table storage.
#[derive(Debug, Clone)]
pub struct AzureTableStore {
    client: ServiceClient,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    value: Vec<Entity>,
}

impl AzureTableStore {
    pub(super) const fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json;odata=nometadata"),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("dataserviceversion", HeaderValue::from_static("3.0"));
    headers.insert(
        "maxdataserviceversion",
        HeaderValue::from_static("3.0;NetFx"),
    );
    headers
}

/// Address of one entity: `Table(PartitionKey='..',RowKey='..')`.
fn entity_path(table: &str, partition_key: &str, row_key: &str) -> String {
    format!(
        "{table}(PartitionKey='{}',RowKey='{}')",
        partition_key.replace('\'', "''"),
        row_key.replace('\'', "''")
    )
}

/// Mark floating-point properties as `Edm.Double`.
///
/// Without the annotation the service infers `Int32` for whole numbers, so a
/// price of `20` would change type between rows.
fn annotate_types(entity: Entity) -> Entity {
    let mut annotated = Entity::new();
    for (name, value) in entity {
        if matches!(&value, Value::Number(n) if n.is_f64()) {
            annotated.insert(format!("{name}@odata.type"), Value::from("Edm.Double"));
        }
        annotated.insert(name, value);
    }
    annotated
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[async_trait]
impl EntityStore for AzureTableStore {
    async fn create_table_if_not_exists(&self, table: &str) -> StorageResult<()> {
        let url = self.client.url(["Tables"], &[])?;
        let mut headers = json_headers();
        headers.insert("prefer", HeaderValue::from_static("return-no-content"));
        let body = serde_json::to_vec(&json!({ "TableName": table }))?;

        ignore_conflict(
            self.client
                .send(Method::POST, url, headers, Bytes::from(body))
                .await
                .map(drop),
        )
    }

    async fn insert_or_replace(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        entity: Entity,
    ) -> StorageResult<()> {
        let path = entity_path(table, partition_key, row_key);
        let url = self.client.url([path.as_str()], &[])?;
        let body = serde_json::to_vec(&annotate_types(entity))?;

        self.client
            .send(Method::PUT, url, json_headers(), Bytes::from(body))
            .await?;
        Ok(())
    }

    async fn query_page(
        &self,
        table: &str,
        continuation: Option<ContinuationToken>,
    ) -> StorageResult<EntityPage> {
        let mut query = Vec::new();
        if let Some(token) = &continuation {
            query.push(("NextPartitionKey", token.next_partition_key.as_str()));
            if let Some(row_key) = &token.next_row_key {
                query.push(("NextRowKey", row_key.as_str()));
            }
        }
        let path = format!("{table}()");
        let url = self.client.url([path.as_str()], &query)?;

        let response = self
            .client
            .send(Method::GET, url, json_headers(), Bytes::new())
            .await?;
        let continuation =
            header(response.headers(), NEXT_PARTITION_KEY).map(|next_partition_key| {
                ContinuationToken {
                    next_partition_key,
                    next_row_key: header(response.headers(), NEXT_ROW_KEY),
                }
            });
        let page: QueryResponse = serde_json::from_slice(&response.bytes().await?)?;

        Ok(EntityPage {
            entities: page.value,
            continuation,
        })
    }
}

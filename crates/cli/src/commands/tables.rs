//! Table listing commands.
//!
//! Rows are printed one page at a time as the scan proceeds, so large tables
//! start producing output before the scan completes.

use std::pin::pin;

use abc_retail_core::{CustomerRecord, ProductRecord};
use abc_retail_web::storage::StorageFacade;
use futures::StreamExt;

use super::CommandError;

/// Print every customer.
///
/// # Errors
///
/// Returns an error if any page cannot be read.
pub async fn customers(storage: &StorageFacade) -> Result<(), CommandError> {
    let mut pages = pin!(storage.customer_pages());
    let mut total = 0;
    while let Some(page) = pages.next().await {
        for customer in page? {
            tracing::info!("{}", customer_line(&customer));
            total += 1;
        }
    }
    tracing::info!("{total} customer(s)");
    Ok(())
}

/// Print every product.
///
/// # Errors
///
/// Returns an error if any page cannot be read.
pub async fn products(storage: &StorageFacade) -> Result<(), CommandError> {
    let mut pages = pin!(storage.product_pages());
    let mut total = 0;
    while let Some(page) = pages.next().await {
        for product in page? {
            tracing::info!("{}", product_line(&product));
            total += 1;
        }
    }
    tracing::info!("{total} product(s)");
    Ok(())
}

fn customer_line(customer: &CustomerRecord) -> String {
    format!(
        "{}  {} <{}>  {}",
        customer.row_key,
        customer.name.as_deref().unwrap_or("-"),
        customer.email.as_deref().unwrap_or("-"),
        customer.address.as_deref().unwrap_or("-"),
    )
}

fn product_line(product: &ProductRecord) -> String {
    format!(
        "[{}] {}  {}  {}",
        product.partition_key,
        product.name.as_deref().unwrap_or("-"),
        product.price.display(),
        product.image_url.as_deref().unwrap_or("-"),
    )
}

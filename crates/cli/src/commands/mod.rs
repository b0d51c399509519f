//! Command implementations.
//!
//! All commands share one provisioned [`StorageFacade`], built from the same
//! environment the web server reads.

pub mod contracts;
pub mod queue;
pub mod tables;

use abc_retail_web::config::{ConfigError, RetailConfig};
use abc_retail_web::storage::azure::AzureStorage;
use abc_retail_web::storage::{StorageError, StorageFacade};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The storage account rejected or failed a request.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Load configuration and provision storage.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or any storage
/// resource cannot be provisioned.
pub async fn connect() -> Result<StorageFacade, CommandError> {
    let config = RetailConfig::from_env()?;

    tracing::info!(
        account = config.connection_string.account_name(),
        "Provisioning storage..."
    );
    let backends = AzureStorage::new(&config.connection_string)?.into_backends();
    Ok(StorageFacade::initialize(backends, config.image_urls).await?)
}

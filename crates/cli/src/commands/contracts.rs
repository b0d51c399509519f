//! Contract share commands.

use abc_retail_web::storage::StorageFacade;

use super::CommandError;

/// Print every contract file name.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub async fn list(storage: &StorageFacade) -> Result<(), CommandError> {
    let contracts = storage.list_contracts().await?;
    for name in &contracts {
        tracing::info!("{name}");
    }
    tracing::info!("{} contract(s)", contracts.len());
    Ok(())
}

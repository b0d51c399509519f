//! Order queue commands.

use abc_retail_core::validate_message;
use abc_retail_web::storage::StorageFacade;

use super::CommandError;

/// Enqueue one order message.
///
/// Empty messages are skipped with a warning, matching the web form.
///
/// # Errors
///
/// Returns an error if the queue cannot be written.
pub async fn send(storage: &StorageFacade, text: &str) -> Result<(), CommandError> {
    if let Err(e) = validate_message(text) {
        tracing::warn!("Message not sent: {e}");
        return Ok(());
    }
    storage.enqueue_message(text).await?;
    tracing::info!("Message enqueued");
    Ok(())
}

/// Receive, print and delete the next visible message.
///
/// # Errors
///
/// Returns an error if the queue cannot be read or the message cannot be
/// deleted.
pub async fn receive(storage: &StorageFacade) -> Result<(), CommandError> {
    match storage.receive_and_delete_next_message().await? {
        Some(text) => tracing::info!("{text}"),
        None => tracing::info!("Queue is empty"),
    }
    Ok(())
}

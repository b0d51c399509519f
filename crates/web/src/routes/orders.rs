//! Order queue route handlers.

use abc_retail_core::validate_message;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::state::AppState;

/// Enqueue form data.
#[derive(Debug, Default, Deserialize)]
pub struct EnqueueForm {
    #[serde(default)]
    pub message: String,
}

/// Queue page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    /// Whether this render follows a dequeue.
    pub dequeued: bool,
    /// Whether the dequeue found a message.
    pub found: bool,
    pub message: String,
}

/// Display the queue page.
pub async fn index() -> impl IntoResponse {
    OrdersTemplate {
        dequeued: false,
        found: false,
        message: String::new(),
    }
}

/// Append an order message to the queue.
#[instrument(skip(state, form))]
pub async fn enqueue(
    State(state): State<AppState>,
    Form(form): Form<EnqueueForm>,
) -> Result<Redirect> {
    match validate_message(&form.message) {
        Ok(()) => {
            state.storage().enqueue_message(&form.message).await?;
            tracing::info!(len = form.message.len(), "Order message enqueued");
        }
        Err(e) => debug!(error = %e, "Enqueue form rejected"),
    }
    Ok(Redirect::to("/orders"))
}

/// Take the next order message and show it.
#[instrument(skip(state))]
pub async fn dequeue(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let message = state.storage().receive_and_delete_next_message().await?;
    Ok(OrdersTemplate {
        dequeued: true,
        found: message.is_some(),
        message: message.unwrap_or_default(),
    })
}

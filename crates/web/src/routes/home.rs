//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;

/// Index page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate;

/// Display the index page.
pub async fn index() -> impl IntoResponse {
    IndexTemplate
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check storage.
pub async fn health() -> &'static str {
    "ok"
}

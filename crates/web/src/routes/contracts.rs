//! Contract file route handlers.

use abc_retail_core::{unique_file_name, validate_upload};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, State},
    response::{IntoResponse, Redirect},
};
use tracing::{debug, instrument};

use super::upload::MultipartForm;
use crate::error::Result;
use crate::state::AppState;

/// Contract listing template.
#[derive(Template, WebTemplate)]
#[template(path = "contracts/index.html")]
pub struct ContractsTemplate {
    pub contracts: Vec<String>,
}

/// Display every contract file name.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let contracts = state.storage().list_contracts().await?;
    Ok(ContractsTemplate { contracts })
}

/// Handle contract upload.
#[instrument(skip(state, multipart))]
pub async fn create(State(state): State<AppState>, multipart: Multipart) -> Result<Redirect> {
    let file = MultipartForm::read(multipart).await?.take_file("file");
    if let Err(e) = validate_upload(file.content.len()) {
        debug!(error = %e, "Contract upload rejected");
        return Ok(Redirect::to("/contracts"));
    }

    let name = unique_file_name(file.file_name.as_deref());
    state.storage().upload_contract(&name, file.content).await?;
    tracing::info!(file = %name, "Contract uploaded");

    Ok(Redirect::to("/contracts"))
}

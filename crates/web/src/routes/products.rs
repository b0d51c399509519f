//! Product route handlers.
//!
//! A product is created from one multipart submission: the form fields
//! become the table row and the `image_file` part goes to blob storage. The
//! image is uploaded first so the row can carry its reference.

use abc_retail_core::{
    ProductInput, ProductRecord, new_row_key, unique_file_name, validate_upload,
};
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

/// One product as shown in the listing.
pub struct ProductRow {
    pub category: String,
    pub name: String,
    pub description: String,
    pub price: String,
    /// Empty when the product has no image.
    pub image_url: String,
}

impl From<ProductRecord> for ProductRow {
    fn from(record: ProductRecord) -> Self {
        Self {
            price: record.price.display(),
            category: record.partition_key,
            name: record.name.unwrap_or_default(),
            description: record.description.unwrap_or_default(),
            image_url: record.image_url.unwrap_or_default(),
        }
    }
}

/// Product listing template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsTemplate {
    pub products: Vec<ProductRow>,
}

/// Display every product.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let products = state.storage().list_products().await?;
    Ok(ProductsTemplate {
        products: products.into_iter().map(ProductRow::from).collect(),
    })
}

/// Handle product form submission with its image.
#[instrument(skip(state, multipart))]
pub async fn create(State(state): State<AppState>, multipart: Multipart) -> Result<Redirect> {
    let mut form = MultipartForm::read(multipart).await?;
    let input = ProductInput {
        name: form.take_field("name"),
        description: form.take_field("description"),
        price: form.take_field("price"),
        category: form.take_field("category"),
    };
    let image = form.take_file("image_file");

    let draft = match input
        .validate()
        .and_then(|draft| validate_upload(image.content.len()).map(|()| draft))
    {
        Ok(draft) => draft,
        Err(e) => {
            debug!(error = %e, "Product form rejected");
            return Ok(Redirect::to("/products"));
        }
    };

    let blob_name = unique_file_name(image.file_name.as_deref());
    let image_url = state
        .storage()
        .upload_image(&blob_name, image.content, image.content_type.as_deref())
        .await?;

    let product = draft.into_record(new_row_key(), image_url);
    state.storage().upsert_product(&product).await?;
    tracing::info!(
        category = %product.partition_key,
        row_key = %product.row_key,
        blob = %blob_name,
        "Product saved"
    );

    Ok(Redirect::to("/products"))
}

//! Form input and validation.
//!
//! Handlers deserialize submitted forms into the `*Input` types, validate them
//! into drafts, then assign identity keys to turn a draft into a record.
//! Validation failures are not shown to the user: the handler skips the
//! storage call and redirects back to the listing page.

use serde::Deserialize;

use super::email::{Email, EmailError};
use super::price::{Price, PriceError};
use super::record::{CustomerRecord, DEFAULT_PRODUCT_CATEGORY, ProductRecord};

/// Reasons submitted input is rejected before reaching storage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{0} is required")]
    Missing(&'static str),
    /// The email field is malformed.
    #[error("invalid email: {0}")]
    Email(#[from] EmailError),
    /// The price field is malformed, negative or too large.
    #[error("invalid price: {0}")]
    Price(#[from] PriceError),
    /// A key field contains characters the entity store forbids in keys.
    #[error("{0} cannot contain '/', '\\', '#', '?' or control characters")]
    InvalidKey(&'static str),
    /// An uploaded file is absent or has no content.
    #[error("uploaded file is empty")]
    EmptyUpload,
}

/// Reject characters that are not allowed in a partition or row key.
fn key_safe(value: String, field: &'static str) -> Result<String, ValidationError> {
    if value
        .chars()
        .any(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(ValidationError::InvalidKey(field));
    }
    Ok(value)
}

/// Trim a field and drop it if nothing is left.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    non_blank(value).ok_or(ValidationError::Missing(field))
}

/// Check an uploaded file before storing it.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyUpload`] for a zero-length upload.
pub const fn validate_upload(len: usize) -> Result<(), ValidationError> {
    if len == 0 {
        return Err(ValidationError::EmptyUpload);
    }
    Ok(())
}

/// Check a queue message before enqueueing it.
///
/// The text itself is opaque and stored as submitted; only emptiness is
/// rejected.
///
/// # Errors
///
/// Returns [`ValidationError::Missing`] for an empty message.
pub fn validate_message(text: &str) -> Result<(), ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::Missing("message"));
    }
    Ok(())
}

// =============================================================================
// Customers
// =============================================================================

/// Customer creation form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// A validated customer awaiting its row key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDraft {
    pub name: String,
    pub email: Email,
    pub address: Option<String>,
}

impl CustomerInput {
    /// Validate the form. Name and email are required; address is optional.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(self) -> Result<CustomerDraft, ValidationError> {
        let name = required(self.name, "name")?;
        let email = Email::parse(&required(self.email, "email")?)?;
        Ok(CustomerDraft {
            name,
            email,
            address: non_blank(self.address),
        })
    }
}

impl CustomerDraft {
    /// Assign identity and build the record.
    #[must_use]
    pub fn into_record(self, row_key: String) -> CustomerRecord {
        CustomerRecord::new(
            row_key,
            Some(self.name),
            Some(self.email.into_inner()),
            self.address,
        )
    }
}

// =============================================================================
// Products
// =============================================================================

/// Product creation form fields (the image travels separately).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A validated product awaiting its row key and image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub category: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
}

impl ProductInput {
    /// Validate the form. Name and price are required; a blank category
    /// files the product under [`DEFAULT_PRODUCT_CATEGORY`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(self) -> Result<ProductDraft, ValidationError> {
        let name = required(self.name, "name")?;
        let price = Price::parse(&required(self.price, "price")?)?;
        let category = match non_blank(self.category) {
            Some(category) => key_safe(category, "category")?,
            None => DEFAULT_PRODUCT_CATEGORY.to_owned(),
        };
        Ok(ProductDraft {
            category,
            name,
            description: non_blank(self.description),
            price,
        })
    }
}

impl ProductDraft {
    /// Assign identity and attach the uploaded image reference.
    #[must_use]
    pub fn into_record(self, row_key: String, image_url: String) -> ProductRecord {
        ProductRecord {
            partition_key: self.category,
            row_key,
            name: Some(self.name),
            description: self.description,
            price: self.price,
            image_url: Some(image_url),
            timestamp: None,
        }
    }
}

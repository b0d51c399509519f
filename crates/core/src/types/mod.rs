//! Core types for ABC Retail.

pub mod email;
pub mod id;
pub mod input;
pub mod price;
pub mod record;

pub use email::{Email, EmailError};
pub use id::{new_row_key, unique_file_name};
pub use input::{
    CustomerDraft, CustomerInput, ProductDraft, ProductInput, ValidationError, validate_message,
    validate_upload,
};
pub use price::{Price, PriceError};
pub use record::{
    CUSTOMERS_PARTITION, CustomerRecord, DEFAULT_PRODUCT_CATEGORY, ProductRecord, TableRecord,
};

//! ABC Retail Core - Shared types library.
//!
//! This crate provides the types passed between the request handlers and the
//! storage facade in `abc-retail-web`, and reused by `retail-cli`:
//! - [`CustomerRecord`] and [`ProductRecord`] - table entities keyed by
//!   `(PartitionKey, RowKey)`
//! - [`Price`] and [`Email`] - validated field types
//! - Identifier generation for row keys and uploaded file names
//! - Form input types that validate into records
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no storage access. Serialization matches the table schema the storage
//! account already holds, so records written here interoperate with other
//! writers of the same tables.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

//! Identifier generation for table rows and uploaded files.
//!
//! Identifiers are random UUID v4 strings. Collisions are not expected and
//! are not checked for: an upsert with a colliding key replaces the existing
//! row, and an upload with a colliding name overwrites the existing object.

use uuid::Uuid;

/// Generate a fresh row key for a new table record.
#[must_use]
pub fn new_row_key() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a unique storage name for an uploaded file.
///
/// Produces `{uuid}_{file_name}` where `file_name` is the last path segment
/// of the client-supplied name (browsers on some platforms send a full
/// path). Produces just `{uuid}` when no usable name was supplied.
#[must_use]
pub fn unique_file_name(original: Option<&str>) -> String {
    let token = Uuid::new_v4();
    match original.map(base_name).filter(|name| !name.is_empty()) {
        Some(name) => format!("{token}_{name}"),
        None => token.to_string(),
    }
}

/// Strip any directory components, accepting both `/` and `\` separators.
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

//! Multipart form reading shared by the upload routes.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use bytes::Bytes;

/// A file part of a multipart submission.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    /// Client-supplied file name, possibly with path components.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Bytes,
}

/// Every part of a multipart submission, split into text fields and files.
///
/// A repeated field name keeps its last value.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Drain the request body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid multipart or exceeds the
    /// body limit.
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if field.file_name().is_some() {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().map(str::to_owned);
                let content = field.bytes().await?;
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        content_type,
                        content,
                    },
                );
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }
        Ok(form)
    }

    /// Remove and return a text field.
    pub fn take_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Remove and return a file; an absent file reads as empty.
    pub fn take_file(&mut self, name: &str) -> UploadedFile {
        self.files.remove(name).unwrap_or_default()
    }
}

//! End-to-end harness for the ABC Retail web backend.
//!
//! Each [`TestApp`] is the full router (templates, body limit, tracing layer)
//! over freshly provisioned in-memory storage, driven in-process with
//! `tower::ServiceExt::oneshot`. No storage account or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p abc-retail-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::fmt::Write as _;
use std::sync::Arc;

use abc_retail_web::routes;
use abc_retail_web::state::AppState;
use abc_retail_web::storage::memory::{
    MemoryBlobStore, MemoryEntityStore, MemoryFileShare, MemoryQueue,
};
use abc_retail_web::storage::{
    CONTRACTS_DIRECTORY, CONTRACTS_SHARE, ImageUrlPolicy, StorageBackends, StorageFacade,
};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use bytes::Bytes;
use tower::ServiceExt;

/// Default request body limit used by [`TestApp::new`].
pub const TEST_MAX_UPLOAD_BYTES: usize = 1024 * 1024;

const BOUNDARY: &str = "abc-retail-test-boundary";

/// The application under test plus direct handles on its storage.
pub struct TestApp {
    router: Router,
    state: AppState,
    files: Arc<MemoryFileShare>,
}

impl TestApp {
    /// Signed image URLs and a 1 MiB body limit.
    pub async fn new() -> Self {
        Self::with_config(ImageUrlPolicy::default(), TEST_MAX_UPLOAD_BYTES).await
    }

    pub async fn with_config(image_urls: ImageUrlPolicy, max_upload_bytes: usize) -> Self {
        let files = Arc::new(MemoryFileShare::default());
        let backends = StorageBackends {
            entities: Arc::new(MemoryEntityStore::default()),
            blobs: Arc::new(MemoryBlobStore::default()),
            queue: Arc::new(MemoryQueue::default()),
            files: files.clone(),
        };
        let storage = StorageFacade::initialize(backends, image_urls)
            .await
            .unwrap();
        let state = AppState::new(storage, max_upload_bytes);

        Self {
            router: routes::app(state.clone()),
            state,
            files,
        }
    }

    /// The facade the handlers use.
    pub fn storage(&self) -> &StorageFacade {
        self.state.storage()
    }

    /// Raw content of a stored contract file.
    pub fn contract_content(&self, name: &str) -> Option<Bytes> {
        self.files
            .read_file(CONTRACTS_SHARE, CONTRACTS_DIRECTORY, name)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::get(path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// POST an `application/x-www-form-urlencoded` body built from `fields`.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// POST a `multipart/form-data` body.
    pub async fn post_multipart(&self, path: &str, parts: &[Part<'_>]) -> TestResponse {
        let request = Request::post(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }
}

/// What a request produced.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    /// Assert a post-redirect-get redirect to `path`.
    pub fn assert_redirect_to(&self, path: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", self.body);
        assert_eq!(self.location.as_deref(), Some(path));
    }
}

/// One multipart form part.
pub enum Part<'a> {
    Field {
        name: &'a str,
        value: &'a str,
    },
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        content: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        let mut head = format!("--{BOUNDARY}\r\n");
        match part {
            Part::Field { name, value } => {
                let _ = write!(
                    head,
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}"
                );
                body.extend_from_slice(head.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                content,
            } => {
                let _ = write!(
                    head,
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: {content_type}\r\n\r\n"
                );
                body.extend_from_slice(head.as_bytes());
                body.extend_from_slice(content);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

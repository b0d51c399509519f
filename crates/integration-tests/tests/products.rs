//! Product creation with image upload.

use abc_retail_core::DEFAULT_PRODUCT_CATEGORY;
use abc_retail_integration_tests::{Part, TestApp};
use abc_retail_web::storage::ImageUrlPolicy;
use axum::http::StatusCode;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

fn product_parts<'a>(category: &'a str, image: &'a [u8]) -> Vec<Part<'a>> {
    vec![
        Part::Field {
            name: "name",
            value: "Desk Lamp",
        },
        Part::Field {
            name: "description",
            value: "Adjustable arm",
        },
        Part::Field {
            name: "price",
            value: "24.5",
        },
        Part::Field {
            name: "category",
            value: category,
        },
        Part::File {
            name: "image_file",
            file_name: "lamp.png",
            content_type: "image/png",
            content: image,
        },
    ]
}

/// Blob name embedded in a `memory://images/{name}[?query]` reference.
fn blob_name(image_url: &str) -> &str {
    let path = image_url.split('?').next().unwrap();
    path.rsplit('/').next().unwrap()
}

#[tokio::test]
async fn test_create_product_uploads_image_and_saves_row() {
    let app = TestApp::new().await;

    app.post_multipart("/products", &product_parts("Lighting", PNG))
        .await
        .assert_redirect_to("/products");

    let products = app.storage().list_products().await.unwrap();
    assert_eq!(products.len(), 1);
    let product = &products[0];
    assert_eq!(product.partition_key, "Lighting");
    assert_eq!(product.name.as_deref(), Some("Desk Lamp"));
    assert_eq!(product.description.as_deref(), Some("Adjustable arm"));
    assert_eq!(product.price.display(), "$24.50");

    let image_url = product.image_url.as_deref().unwrap();
    assert!(image_url.starts_with("memory://images/"));
    assert!(image_url.contains("sp=r"), "signed reference expected: {image_url}");

    let name = blob_name(image_url);
    assert!(name.ends_with("_lamp.png"));
    let stored = app.storage().download_image(name).await.unwrap().unwrap();
    assert_eq!(&stored[..], PNG);

    let page = app.get("/products").await;
    assert!(page.body.contains("Desk Lamp"));
    assert!(page.body.contains("$24.50"));
}

#[tokio::test]
async fn test_public_policy_stores_plain_url() {
    let app = TestApp::with_config(ImageUrlPolicy::Public, 1024 * 1024).await;

    app.post_multipart("/products", &product_parts("Lighting", PNG))
        .await
        .assert_redirect_to("/products");

    let products = app.storage().list_products().await.unwrap();
    let image_url = products[0].image_url.as_deref().unwrap();
    assert!(image_url.starts_with("memory://images/"));
    assert!(!image_url.contains('?'));
}

#[tokio::test]
async fn test_blank_category_uses_default() {
    let app = TestApp::new().await;

    app.post_multipart("/products", &product_parts("  ", PNG))
        .await
        .assert_redirect_to("/products");

    let products = app.storage().list_products().await.unwrap();
    assert_eq!(products[0].partition_key, DEFAULT_PRODUCT_CATEGORY);
}

#[tokio::test]
async fn test_product_without_image_is_not_stored() {
    let app = TestApp::new().await;

    app.post_multipart("/products", &product_parts("Lighting", b""))
        .await
        .assert_redirect_to("/products");

    assert!(app.storage().list_products().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_price_is_not_stored() {
    let app = TestApp::new().await;
    let mut parts = product_parts("Lighting", PNG);
    parts[2] = Part::Field {
        name: "price",
        value: "-3",
    };

    app.post_multipart("/products", &parts)
        .await
        .assert_redirect_to("/products");

    assert!(app.storage().list_products().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = TestApp::with_config(ImageUrlPolicy::default(), 256).await;
    let image = vec![0_u8; 4096];

    let response = app
        .post_multipart("/products", &product_parts("Lighting", &image))
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.storage().list_products().await.unwrap().is_empty());
}

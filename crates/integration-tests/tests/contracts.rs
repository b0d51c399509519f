//! Contract upload and listing tests.

use abc_retail_integration_tests::{Part, TestApp};

const CONTRACT: &[u8] = b"%PDF-1.7 supplier agreement";

fn contract_part<'a>(file_name: &'a str, content: &'a [u8]) -> [Part<'a>; 1] {
    [Part::File {
        name: "file",
        file_name,
        content_type: "application/pdf",
        content,
    }]
}

#[tokio::test]
async fn test_upload_contract_then_list() {
    let app = TestApp::new().await;

    app.post_multipart("/contracts", &contract_part("nda.pdf", CONTRACT))
        .await
        .assert_redirect_to("/contracts");

    let contracts = app.storage().list_contracts().await.unwrap();
    assert_eq!(contracts.len(), 1);
    let name = &contracts[0];
    assert!(name.ends_with("_nda.pdf"));
    assert_eq!(&app.contract_content(name).unwrap()[..], CONTRACT);

    let page = app.get("/contracts").await;
    assert!(page.body.contains(name.as_str()));
}

#[tokio::test]
async fn test_client_path_is_stripped_from_name() {
    let app = TestApp::new().await;

    app.post_multipart(
        "/contracts",
        &contract_part("documents/2024/lease.pdf", CONTRACT),
    )
    .await
    .assert_redirect_to("/contracts");

    let contracts = app.storage().list_contracts().await.unwrap();
    assert!(contracts[0].ends_with("_lease.pdf"));
    assert!(!contracts[0].contains('/'));
}

#[tokio::test]
async fn test_empty_contract_is_not_stored() {
    let app = TestApp::new().await;

    app.post_multipart("/contracts", &contract_part("empty.pdf", b""))
        .await
        .assert_redirect_to("/contracts");

    assert!(app.storage().list_contracts().await.unwrap().is_empty());
}

//! Customer form and listing tests.

use abc_retail_core::CUSTOMERS_PARTITION;
use abc_retail_integration_tests::TestApp;

#[tokio::test]
async fn test_create_customer_then_list() {
    let app = TestApp::new().await;

    let response = app
        .post_form(
            "/customers",
            &[
                ("name", "Ada Lovelace"),
                ("email", "ada@example.com"),
                ("address", "12 Analytical Way"),
            ],
        )
        .await;
    response.assert_redirect_to("/customers");

    let customers = app.storage().list_customers().await.unwrap();
    assert_eq!(customers.len(), 1);
    let customer = &customers[0];
    assert_eq!(customer.partition_key, CUSTOMERS_PARTITION);
    assert_eq!(customer.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(customer.email.as_deref(), Some("ada@example.com"));
    assert_eq!(customer.address.as_deref(), Some("12 Analytical Way"));
    assert!(customer.timestamp.is_some());

    let page = app.get("/customers").await;
    assert!(page.body.contains("Ada Lovelace"));
    assert!(page.body.contains("ada@example.com"));
}

#[tokio::test]
async fn test_each_submission_gets_its_own_row() {
    let app = TestApp::new().await;
    for _ in 0..2 {
        app.post_form(
            "/customers",
            &[("name", "Grace Hopper"), ("email", "grace@example.com")],
        )
        .await
        .assert_redirect_to("/customers");
    }

    let customers = app.storage().list_customers().await.unwrap();
    assert_eq!(customers.len(), 2);
    assert_ne!(customers[0].row_key, customers[1].row_key);
    assert!(customers.iter().all(|c| c.address.is_none()));
}

#[tokio::test]
async fn test_invalid_customer_is_not_stored() {
    let app = TestApp::new().await;

    app.post_form(
        "/customers",
        &[("name", "No Email"), ("email", "not-an-email")],
    )
    .await
    .assert_redirect_to("/customers");
    app.post_form("/customers", &[("email", "nameless@example.com")])
        .await
        .assert_redirect_to("/customers");

    assert!(app.storage().list_customers().await.unwrap().is_empty());
}

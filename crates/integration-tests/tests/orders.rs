//! Order queue tests.

use abc_retail_integration_tests::TestApp;
use axum::http::StatusCode;

#[tokio::test]
async fn test_messages_are_processed_in_order() {
    let app = TestApp::new().await;

    for message in ["order 1", "order 2"] {
        app.post_form("/orders/enqueue", &[("message", message)])
            .await
            .assert_redirect_to("/orders");
    }

    let first = app.post_form("/orders/dequeue", &[]).await;
    assert_eq!(first.status, StatusCode::OK);
    assert!(first.body.contains("<strong>order 1</strong>"));

    let second = app.post_form("/orders/dequeue", &[]).await;
    assert!(second.body.contains("<strong>order 2</strong>"));

    let empty = app.post_form("/orders/dequeue", &[]).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert!(empty.body.contains("The queue is empty."));
}

#[tokio::test]
async fn test_dequeue_deletes_the_message() {
    let app = TestApp::new().await;
    app.storage().enqueue_message("only once").await.unwrap();

    let response = app.post_form("/orders/dequeue", &[]).await;
    assert!(response.body.contains("only once"));
    assert_eq!(
        app.storage().receive_and_delete_next_message().await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_empty_message_is_not_enqueued() {
    let app = TestApp::new().await;

    app.post_form("/orders/enqueue", &[("message", "")])
        .await
        .assert_redirect_to("/orders");

    assert_eq!(
        app.storage().receive_and_delete_next_message().await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_message_text_is_escaped_in_page() {
    let app = TestApp::new().await;
    app.storage()
        .enqueue_message("<script>alert(1)</script>")
        .await
        .unwrap();

    let response = app.post_form("/orders/dequeue", &[]).await;
    assert!(!response.body.contains("<script>"));
    assert!(response.body.contains("&lt;script&gt;"));
}

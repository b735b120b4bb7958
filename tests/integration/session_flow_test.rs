//! Login, persistence across clients, and logout over real HTTP

use mockito::Matcher;
use serde_json::json;

use portfolio_gateway::{PortfolioClient, TokenKey};

use crate::test_harness::TestBackend;

#[tokio::test]
async fn test_login_persists_session_for_next_client() {
    let mut backend = TestBackend::start().await;
    let login = backend
        .server
        .mock("POST", "/api/token/")
        .match_body(Matcher::Json(json!({ "username": "alice", "password": "s3cret" })))
        .with_status(200)
        .with_body(json!({ "access": "A1", "refresh": "R1" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = PortfolioClient::from_config(backend.config()).await.unwrap();
    assert!(!client.is_logged_in());

    client.auth.login("alice", "s3cret").await.unwrap();
    login.assert_async().await;
    assert!(client.is_logged_in());

    // A second client reading the same token file starts logged in
    let next = PortfolioClient::from_config(backend.config()).await.unwrap();
    assert!(next.is_logged_in());

    let composition = backend
        .server
        .mock("GET", "/api/portfolio/composition/")
        .match_query(Matcher::UrlEncoded("currency".into(), "USD".into()))
        .match_header("authorization", "Bearer A1")
        .with_status(200)
        .with_body(r#"{"assets":[]}"#)
        .create_async()
        .await;
    let value = next.portfolio.composition(Some("USD")).await.unwrap();
    composition.assert_async().await;
    assert_eq!(value, json!({ "assets": [] }));

    next.auth.logout().await.unwrap();
    assert!(!next.is_logged_in());
    assert_eq!(backend.stored(TokenKey::Access).await, None);
    assert_eq!(backend.stored(TokenKey::Refresh).await, None);
}

#[tokio::test]
async fn test_register_does_not_create_session() {
    let mut backend = TestBackend::start().await;
    backend
        .server
        .mock("POST", "/api/user/register/")
        .with_status(201)
        .with_body(json!({ "id": 7, "username": "bob" }).to_string())
        .create_async()
        .await;

    let client = PortfolioClient::from_config(backend.config()).await.unwrap();
    let user = client.auth.register("bob", "hunter22").await.unwrap();

    assert_eq!(user.id, 7);
    assert!(!client.is_logged_in());
    assert!(!backend.token_path().exists());
}

//! Refresh protocol over real HTTP

use mockito::Matcher;
use serde_json::{json, Value};

use portfolio_gateway::{AuthEvent, GatewayError, PortfolioApi, TokenKey};

use crate::test_harness::{collect_events, TestBackend, REFRESH_PATH};

#[tokio::test]
async fn test_expired_access_token_is_refreshed_and_replayed() {
    let mut backend = TestBackend::start().await;
    backend.seed_tokens("A1", "R1").await;

    let expired = backend.mock_expired("GET", "/api/portfolio/transactions/", "A1").await;
    let refreshed = backend
        .mock_protected("GET", "/api/portfolio/transactions/", "A2", "[]")
        .await;
    let refresh = backend.mock_refresh("R1", "A2").await;

    let gateway = backend.gateway();
    let mut events = gateway.subscribe();

    let body: Value = gateway.get_json("/api/portfolio/transactions/").await.unwrap();

    assert_eq!(body, json!([]));
    expired.assert_async().await;
    refreshed.assert_async().await;
    refresh.assert_async().await;

    // The new access token is persisted, the refresh token is kept
    assert_eq!(backend.stored(TokenKey::Access).await.as_deref(), Some("A2"));
    assert_eq!(backend.stored(TokenKey::Refresh).await.as_deref(), Some("R1"));

    let events = collect_events(&mut events);
    assert!(matches!(events.as_slice(), [AuthEvent::TokenRefreshed { .. }]));
}

#[tokio::test]
async fn test_rejected_refresh_clears_token_file() {
    let mut backend = TestBackend::start().await;
    backend.seed_tokens("A1", "R1").await;

    let expired = backend.mock_expired("GET", "/api/portfolio/profit/", "A1").await;
    let refresh = backend
        .server
        .mock("POST", REFRESH_PATH)
        .with_status(401)
        .with_body(r#"{"detail":"Token is blacklisted","code":"token_not_valid"}"#)
        .expect(1)
        .create_async()
        .await;

    let gateway = backend.gateway();
    let mut events = gateway.subscribe();

    let err = gateway.get("/api/portfolio/profit/").await.unwrap_err();

    assert!(matches!(err, GatewayError::RefreshRejected { status: 401, .. }));
    expired.assert_async().await;
    refresh.assert_async().await;
    assert_eq!(backend.stored(TokenKey::Access).await, None);
    assert_eq!(backend.stored(TokenKey::Refresh).await, None);

    let events = collect_events(&mut events);
    assert_eq!(events.iter().filter(|e| e.is_logout()).count(), 1);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mut backend = TestBackend::start().await;
    backend.seed_tokens("A1", "R1").await;

    let broken = backend
        .server
        .mock("GET", "/api/portfolio/composition/")
        .match_query(Matcher::UrlEncoded("currency".into(), "PLN".into()))
        .with_status(500)
        .with_body("Internal Server Error")
        .expect(1)
        .create_async()
        .await;
    let refresh = backend
        .server
        .mock("POST", REFRESH_PATH)
        .expect(0)
        .create_async()
        .await;

    let api = PortfolioApi::new(std::sync::Arc::new(backend.gateway()));
    let err = api.composition(None).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.body(), Some("Internal Server Error"));
    broken.assert_async().await;
    refresh.assert_async().await;
    assert_eq!(backend.stored(TokenKey::Access).await.as_deref(), Some("A1"));
}

#[tokio::test]
async fn test_portfolio_history_through_refresh() {
    let mut backend = TestBackend::start().await;
    backend.seed_tokens("A1", "R1").await;

    let query = Matcher::AllOf(vec![
        Matcher::UrlEncoded("currency".into(), "EUR".into()),
        Matcher::UrlEncoded("start_date".into(), "2024-05-01".into()),
    ]);
    backend
        .server
        .mock("GET", "/api/portfolio/value-history/")
        .match_query(query.clone())
        .match_header("authorization", "Bearer A1")
        .with_status(401)
        .create_async()
        .await;
    let history = backend
        .server
        .mock("GET", "/api/portfolio/value-history/")
        .match_query(query)
        .match_header("authorization", "Bearer A2")
        .with_status(200)
        .with_body(
            json!([
                {"date": "2024-05-01", "total_value": 1200.0, "total_invested": 1000.0, "currency": "EUR"}
            ])
            .to_string(),
        )
        .create_async()
        .await;
    backend.mock_refresh("R1", "A2").await;

    let api = PortfolioApi::new(std::sync::Arc::new(backend.gateway()));
    let snapshots = api
        .value_history(Some("EUR"), chrono::NaiveDate::from_ymd_opt(2024, 5, 1), None)
        .await
        .unwrap();

    history.assert_async().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].total_value, 1200.0);
    assert_eq!(snapshots[0].currency, "EUR");
}

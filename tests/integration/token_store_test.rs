//! File token store persistence

use portfolio_gateway::{FileTokenStore, GatewayError, TokenKey, TokenPair, TokenStore};

#[tokio::test]
async fn test_tokens_survive_new_store_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("tokens.json");

    let first = FileTokenStore::new(&path);
    first.store_pair(&TokenPair::new("A1", "R1")).await.unwrap();

    let second = FileTokenStore::new(&path);
    assert_eq!(second.get(TokenKey::Access).await.unwrap().as_deref(), Some("A1"));
    assert_eq!(second.get(TokenKey::Refresh).await.unwrap().as_deref(), Some("R1"));

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["access"], "A1");
    assert_eq!(on_disk["refresh"], "R1");
}

#[tokio::test]
async fn test_clear_removes_both_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    let store = FileTokenStore::new(&path);
    store.store_pair(&TokenPair::new("A1", "R1")).await.unwrap();

    store.clear().await.unwrap();

    let reopened = FileTokenStore::new(&path);
    assert_eq!(reopened.get(TokenKey::Access).await.unwrap(), None);
    assert_eq!(reopened.get(TokenKey::Refresh).await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::new(dir.path().join("absent.json"));

    assert_eq!(store.get(TokenKey::Access).await.unwrap(), None);
    store.remove(TokenKey::Refresh).await.unwrap();
}

#[tokio::test]
async fn test_unreadable_file_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    std::fs::write(&path, "not json").unwrap();

    let err = FileTokenStore::new(&path).get(TokenKey::Access).await.unwrap_err();
    assert!(matches!(err, GatewayError::Storage { .. }));
}

//! Account tests — sign-up validation, uniqueness and credential checks.

mod common;

use decisionlog::auth::{accounts, password};
use decisionlog::errors::CoreError;
use decisionlog::store::MemoryStore;
use common::TEST_PASSWORD;

#[test]
fn test_sign_up_validation() {
    assert!(accounts::validate_sign_up("a@example.com", TEST_PASSWORD).is_ok());
    match accounts::validate_sign_up("a@example", TEST_PASSWORD) {
        Err(CoreError::Validation(msg)) => assert_eq!(msg, "Enter a valid email address."),
        other => panic!("expected validation error, got {other:?}"),
    }
    match accounts::validate_sign_up("a@example.com", "12345") {
        Err(CoreError::Validation(msg)) => assert_eq!(msg, "Password must be at least 6 characters."),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_emails_are_unique_case_insensitively() {
    let store = MemoryStore::new();
    let hash = password::hash_password(TEST_PASSWORD).expect("Failed to hash password");

    accounts::create_account(&store, "Dana@Example.com", hash.clone()).await.unwrap();
    match accounts::create_account(&store, "dana@example.com", hash).await {
        Err(CoreError::Conflict(msg)) => assert_eq!(msg, "An account with that email already exists."),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate() {
    let store = MemoryStore::new();
    let hash = password::hash_password(TEST_PASSWORD).expect("Failed to hash password");
    let created = accounts::create_account(&store, "dana@example.com", hash).await.unwrap();

    let signed_in = accounts::authenticate(&store, "DANA@example.com", TEST_PASSWORD).await.unwrap();
    assert_eq!(signed_in, created);

    for (email, pw) in [("dana@example.com", "wrongpass"), ("ghost@example.com", TEST_PASSWORD)] {
        match accounts::authenticate(&store, email, pw).await {
            Err(CoreError::Validation(msg)) => assert_eq!(msg, accounts::INVALID_CREDENTIALS),
            other => panic!("expected invalid credentials, got {other:?}"),
        }
    }
}

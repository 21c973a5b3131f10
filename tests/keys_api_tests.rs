// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encrypted API-key routes over the in-memory store.

use axum::http::StatusCode;
use mission_control_api::db::Repository;
use mission_control_api::services::CredentialService;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, request, sign_test_token, TestDeps};

async fn create_key(app: &axum::Router, token: &str, name: &str, key: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/keys",
            Some(token),
            Some(json!({"provider": "anthropic", "name": name, "key": key})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_credential_lifecycle() {
    let (app, _) = create_test_app();
    let token = sign_test_token("uid-a", "a@example.com");

    let created = create_key(&app, &token, "Main", "sk-ant-abcdef1234").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["provider"], "anthropic");
    assert_eq!(created["key_hint"], "sk-...1234");
    assert_eq!(created["created_at"], created["updated_at"]);

    let response = app
        .clone()
        .oneshot(request("GET", "/api/keys", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/keys/{}", id),
            Some(&token),
            Some(json!({"name": "Renamed"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["key_hint"], "sk-...1234");

    let response = app
        .clone()
        .oneshot(request("DELETE", &format!("/api/keys/{}", id), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/api/keys/{}", id), Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["details"], "Credential not found");
}

#[tokio::test]
async fn test_responses_never_expose_ciphertext_or_secret() {
    let (app, _) = create_test_app();
    let token = sign_test_token("uid-a", "a@example.com");
    let secret = "sk-proj-supersecretvalue";

    let created = create_key(&app, &token, "Main", secret).await;
    assert!(created.get("encrypted_key").is_none());
    assert!(created.get("key_suffix").is_none());

    for uri in ["/api/keys".to_string(), format!("/api/keys/{}", created["id"].as_str().unwrap())] {
        let response = app
            .clone()
            .oneshot(request("GET", &uri, Some(&token), None))
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains(secret));
        assert!(!text.contains("encrypted_key"));
    }
}

#[tokio::test]
async fn test_short_key_is_unprocessable() {
    let (app, _) = create_test_app();
    let token = sign_test_token("uid-a", "a@example.com");

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/keys",
            Some(&token),
            Some(json!({"provider": "openai", "name": "Bad", "key": "short"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("API key must be at least 8 characters"));

    let response = app
        .oneshot(request("GET", "/api/keys", Some(&token), None))
        .await
        .unwrap();
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_and_delete_unknown_id_is_not_found() {
    let (app, _) = create_test_app();
    let token = sign_test_token("uid-a", "a@example.com");

    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/keys/does-not-exist",
            Some(&token),
            Some(json!({"name": "x"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(request("DELETE", "/api/keys/does-not-exist", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_secret_update_reencrypts_and_rehints() {
    let (app, state) = create_test_app();
    let token = sign_test_token("uid-a", "a@example.com");

    let created = create_key(&app, &token, "Main", "sk-ant-oldsecret1").await;
    let id = created["id"].as_str().unwrap().to_string();
    let repo = Repository::credentials_for(state.db.clone(), "uid-a");
    let before = repo.get(&id).await.unwrap().unwrap();

    let response = app
        .oneshot(request(
            "PUT",
            &format!("/api/keys/{}", id),
            Some(&token),
            Some(json!({"key": "sk-ant-newsecret2"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["key_hint"], "sk-...ret2");

    let after = repo.get(&id).await.unwrap().unwrap();
    assert_ne!(before.encrypted_key, after.encrypted_key);

    let service = CredentialService::new(state.cipher.as_deref(), repo);
    assert_eq!(service.reveal(&id).await.unwrap(), "sk-ant-newsecret2");
}

#[tokio::test]
async fn test_credentials_are_isolated_per_user() {
    let (app, _) = create_test_app();
    let alice = sign_test_token("uid-alice", "alice@example.com");
    let bob = sign_test_token("uid-bob", "bob@example.com");

    let created = create_key(&app, &alice, "Alice key", "sk-alice-12345678").await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(request("GET", "/api/keys", Some(&bob), None))
        .await
        .unwrap();
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    for method in ["GET", "DELETE"] {
        let response = app
            .clone()
            .oneshot(request(method, &format!("/api/keys/{}", id), Some(&bob), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // Alice still sees her key after Bob's attempts.
    let response = app
        .oneshot(request("GET", &format!("/api/keys/{}", id), Some(&alice), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_encryption_key_is_configuration_error() {
    let mut deps = TestDeps::new();
    deps.config.credential_encryption_key = None;
    let (app, _) = deps.build();
    let token = sign_test_token("uid-a", "a@example.com");

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/keys",
            Some(&token),
            Some(json!({"provider": "openai", "name": "Main", "key": "sk-openai-1234567"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "configuration_error");

    // Listing needs no cipher.
    let response = app
        .oneshot(request("GET", "/api/keys", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_credential_responses_are_not_cacheable() {
    let (app, _) = create_test_app();
    let token = sign_test_token("uid-cache", "cache@example.com");
    let created = create_key(&app, &token, "Main", "sk-ant-abcdef1234").await;

    for uri in ["/api/keys".to_string(), format!("/api/keys/{}", created["id"].as_str().unwrap())] {
        let response = app
            .clone()
            .oneshot(request("GET", &uri, Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("Cache-Control").unwrap(), "no-store");
        assert_eq!(
            headers.get("Content-Security-Policy").unwrap(),
            "default-src 'none'; frame-ancestors 'none'"
        );
    }
}

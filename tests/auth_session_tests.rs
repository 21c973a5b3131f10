// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pending sign-in session expiry.

use axum::http::StatusCode;
use mission_control_api::models::{AuthTokens, UserProfile};
use mission_control_api::services::auth_sessions::SESSION_TTL;
use mission_control_api::services::{AuthSessionStore, ManualClock, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

mod common;
use common::{body_json, request, TestDeps};

fn tokens() -> AuthTokens {
    AuthTokens {
        id_token: "id".to_string(),
        refresh_token: "refresh".to_string(),
        user: UserProfile {
            uid: "uid".to_string(),
            email: "a@example.com".to_string(),
            display_name: None,
            avatar_url: None,
        },
    }
}

#[test]
fn test_expired_session_is_unreachable_before_pruning() {
    let clock = Arc::new(ManualClock::new());
    let store = AuthSessionStore::new(clock.clone());
    let id = store.create().unwrap();

    clock.advance(SESSION_TTL);
    assert_eq!(store.get(&id), Some(SessionStatus::Pending));

    clock.advance(Duration::from_secs(1));
    assert_eq!(store.get(&id), None);
    assert_eq!(store.take_finished(&id), None);
    assert!(!store.complete(&id, tokens()));

    // Still occupying memory until pruned.
    assert_eq!(store.len(), 1);
    assert_eq!(store.prune_expired(), 1);
    assert!(store.is_empty());
}

#[test]
fn test_prune_keeps_live_sessions() {
    let clock = Arc::new(ManualClock::new());
    let store = AuthSessionStore::new(clock.clone());

    let old = store.create().unwrap();
    clock.advance(Duration::from_secs(200));
    let young = store.create().unwrap();
    clock.advance(Duration::from_secs(150));

    assert_eq!(store.prune_expired(), 1);
    assert_eq!(store.get(&old), None);
    assert_eq!(store.get(&young), Some(SessionStatus::Pending));
}

#[test]
fn test_abandoned_sessions_are_pruned_on_create() {
    let clock = Arc::new(ManualClock::new());
    let store = AuthSessionStore::new(clock.clone());

    for _ in 0..100 {
        store.create().unwrap();
    }
    clock.advance(SESSION_TTL + Duration::from_secs(1));

    store.create().unwrap();
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_poll_after_ttl_is_not_found() {
    let clock = Arc::new(ManualClock::new());
    let mut deps = TestDeps::new();
    deps.clock = clock.clone();
    let (app, state) = deps.build();

    let response = app
        .clone()
        .oneshot(request("POST", "/api/auth/google/start", None, None))
        .await
        .unwrap();
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(state.sessions.complete(&session_id, tokens()));

    clock.advance(SESSION_TTL + Duration::from_secs(1));

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/auth/google/poll?session_id={}", session_id),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(state.sessions.is_empty());
}

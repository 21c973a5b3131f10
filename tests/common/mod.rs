// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use mission_control_api::config::Config;
use mission_control_api::db::FirestoreDb;
use mission_control_api::routes::create_router;
use mission_control_api::routes::websocket::ConnectionManager;
use mission_control_api::services::token_verifier::{DevBypassVerifier, FirebaseTokenVerifier};
use mission_control_api::services::{
    AuthSessionStore, Clock, CredentialCipher, GoogleOAuthClient, IdentityToolkitClient,
    SystemClock, TokenVerifier,
};
use mission_control_api::AppState;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TEST_KID: &str = "test-kid";
const TEST_PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/test_rsa_private.pem");
const TEST_PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/test_rsa_public.pem");

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection against the emulator.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    let host = std::env::var("FIRESTORE_EMULATOR_HOST").ok();
    FirestoreDb::new("test-project", host.as_deref())
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Verifier that accepts tokens signed by [`sign_test_token`].
#[allow(dead_code)]
pub fn test_verifier() -> Arc<dyn TokenVerifier> {
    let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY).expect("test public key");
    Arc::new(
        FirebaseTokenVerifier::new_with_static_key("test-project", TEST_KID, key)
            .expect("static verifier"),
    )
}

#[derive(Serialize)]
struct TestClaims<'a> {
    iss: String,
    aud: &'a str,
    sub: &'a str,
    iat: u64,
    exp: u64,
    email: &'a str,
}

/// Sign a Firebase-shaped ID token for the test project.
#[allow(dead_code)]
pub fn sign_test_token(uid: &str, email: &str) -> String {
    sign_test_token_for(uid, email, "test-project")
}

/// Sign a token whose `aud`/`iss` name another project.
#[allow(dead_code)]
pub fn sign_test_token_for(uid: &str, email: &str, project: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = TestClaims {
        iss: format!("https://securetoken.google.com/{}", project),
        aud: project,
        sub: uid,
        iat: now,
        exp: now + 3600,
        email,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());

    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY).expect("test private key"),
    )
    .unwrap()
}

/// Dependencies of a test app; override fields before calling [`TestDeps::build`].
pub struct TestDeps {
    pub config: Config,
    pub db: FirestoreDb,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub google_oauth: GoogleOAuthClient,
    pub identity_toolkit: IdentityToolkitClient,
    pub clock: Arc<dyn Clock>,
}

impl TestDeps {
    pub fn new() -> Self {
        let config = Config::test_default();
        Self {
            google_oauth: GoogleOAuthClient::new(&config).unwrap(),
            identity_toolkit: IdentityToolkitClient::from_config(&config).unwrap(),
            config,
            db: FirestoreDb::in_memory(),
            token_verifier: test_verifier(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Point both upstream clients at a mock server.
    #[allow(dead_code)]
    pub fn with_upstream(mut self, base_url: &str) -> Self {
        self.google_oauth = GoogleOAuthClient::new(&self.config)
            .unwrap()
            .with_token_url(format!("{}/token", base_url));
        self.identity_toolkit = IdentityToolkitClient::with_base_url(
            base_url,
            Some("test-api-key".to_string()),
            false,
        )
        .unwrap();
        self
    }

    pub fn build(self) -> (axum::Router, Arc<AppState>) {
        let cipher = self
            .config
            .credential_encryption_key
            .as_deref()
            .map(|key| Arc::new(CredentialCipher::from_base64(key).unwrap()));

        let state = Arc::new(AppState {
            config: self.config,
            db: self.db,
            cipher,
            token_verifier: self.token_verifier,
            google_oauth: self.google_oauth,
            identity_toolkit: self.identity_toolkit,
            sessions: AuthSessionStore::new(self.clock),
            connections: ConnectionManager::new(),
        });

        (create_router(state.clone()), state)
    }
}

/// Test app over in-memory storage with real token verification.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    TestDeps::new().build()
}

/// Test app with the dev bypass active.
#[allow(dead_code)]
pub fn create_dev_bypass_app() -> (axum::Router, Arc<AppState>) {
    let mut deps = TestDeps::new();
    deps.config.auth_disabled = true;
    deps.token_verifier = Arc::new(DevBypassVerifier);
    deps.build()
}

/// Build a request with an optional bearer token and JSON body.
#[allow(dead_code)]
pub fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

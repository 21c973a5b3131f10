// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mission Control API Server
//!
//! Accounts, Google sign-in and encrypted API-key storage for the Mission
//! Control desktop app.

use mission_control_api::{
    config::Config,
    db::FirestoreDb,
    routes::websocket::ConnectionManager,
    services::{
        build_token_verifier, AuthSessionStore, CredentialCipher, GoogleOAuthClient,
        IdentityToolkitClient, SystemClock,
    },
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often abandoned sign-in sessions are pruned.
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        project = %config.firebase_project_id,
        auth_disabled = config.auth_disabled,
        "Starting Mission Control API"
    );

    // A malformed key is fatal; an absent one only disables the key routes.
    let cipher = match &config.credential_encryption_key {
        Some(key) => Some(Arc::new(CredentialCipher::from_base64(key)?)),
        None => {
            tracing::warn!("CREDENTIAL_ENCRYPTION_KEY not set; key storage is disabled");
            None
        }
    };

    let db = FirestoreDb::new(
        &config.firebase_project_id,
        config.firestore_emulator_host.as_deref(),
    )
    .await?;

    let identity_toolkit = IdentityToolkitClient::from_config(&config)?;
    let token_verifier = build_token_verifier(&config, &identity_toolkit)?;
    let google_oauth = GoogleOAuthClient::new(&config)?;

    let sessions = AuthSessionStore::new(Arc::new(SystemClock));
    tokio::spawn(mission_control_api::services::auth_sessions::run_session_cleanup(
        sessions.clone(),
        SESSION_CLEANUP_INTERVAL,
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        cipher,
        token_verifier,
        google_oauth,
        identity_toolkit,
        sessions,
        connections: ConnectionManager::new(),
    });

    let app = mission_control_api::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mission_control_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();

    Ok(())
}

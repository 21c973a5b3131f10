// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Mission Control API: accounts, Google sign-in and encrypted API-key
//! storage for the Mission Control desktop app.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use routes::websocket::ConnectionManager;
use services::{
    AuthSessionStore, CredentialCipher, GoogleOAuthClient, IdentityToolkitClient, TokenVerifier,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    /// `None` when `CREDENTIAL_ENCRYPTION_KEY` is unset; key routes then fail
    /// with a configuration error.
    pub cipher: Option<Arc<CredentialCipher>>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub google_oauth: GoogleOAuthClient,
    pub identity_toolkit: IdentityToolkitClient,
    pub sessions: AuthSessionStore,
    pub connections: ConnectionManager,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google / Firebase sign-in routes.

use axum::{
    extract::{Query, State},
    response::Html,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AuthTokens, UserProfile};
use crate::services::identity_toolkit::DEV_PASSWORD;
use crate::services::SessionStatus;
use crate::AppState;

/// Routes that need no token.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/google/exchange", post(google_exchange))
        .route("/api/auth/google/start", post(google_start))
        .route("/api/auth/google/callback", get(google_callback))
        .route("/api/auth/google/poll", get(google_poll))
        .route("/api/auth/dev/signin", post(dev_sign_in))
}

/// Routes behind `require_auth`.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/me", get(get_me))
}

/// Authorization code → Google tokens → Firebase session → user upsert.
///
/// Nothing is written unless both upstream exchanges succeed.
async fn sign_in_with_code(state: &AppState, code: &str, redirect_uri: &str) -> Result<AuthTokens> {
    let google = state.google_oauth.exchange_code(code, redirect_uri).await?;

    let firebase = state
        .identity_toolkit
        .sign_in_with_idp(
            &google.id_token,
            google.access_token.as_deref(),
            &state.config.api_base_url,
        )
        .await?;

    let user = Repository::users(state.db.clone())
        .create_or_update(
            &firebase.local_id,
            firebase.email.as_deref().unwrap_or_default(),
            firebase.display_name,
            firebase.photo_url,
        )
        .await?;

    Ok(AuthTokens {
        id_token: firebase.id_token,
        refresh_token: firebase.refresh_token,
        user: user.into(),
    })
}

// ─── Loopback code exchange ──────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ExchangeRequest {
    #[validate(length(min = 1, message = "code must not be empty"))]
    pub code: String,
    #[validate(length(min = 1, message = "redirect_uri must not be empty"))]
    pub redirect_uri: String,
}

/// Exchange an authorization code obtained by the desktop app's loopback
/// redirect.
async fn google_exchange(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExchangeRequest>,
) -> Result<Json<AuthTokens>> {
    body.validate()?;
    let tokens = sign_in_with_code(&state, &body.code, &body.redirect_uri).await?;
    tracing::info!(uid = %tokens.user.uid, "Google sign-in completed");
    Ok(Json(tokens))
}

// ─── Browser redirect flow ───────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "apps/desktop/src/lib/generated/")
)]
pub struct GoogleAuthStartResponse {
    pub session_id: String,
    pub auth_url: String,
}

async fn google_start(State(state): State<Arc<AppState>>) -> Result<Json<GoogleAuthStartResponse>> {
    if state.config.google_client_id.is_none() {
        return Err(AppError::Configuration(
            "Google OAuth not configured".to_string(),
        ));
    }

    let session_id = state
        .sessions
        .create()
        .map_err(|e| AppError::Internal(e.into()))?;

    let auth_url = state
        .google_oauth
        .authorization_url(&state.config.google_callback_url(), &session_id)?;

    tracing::debug!(pending = state.sessions.len(), "Started Google sign-in session");

    Ok(Json(GoogleAuthStartResponse {
        session_id,
        auth_url,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: String,
    state: String,
}

const SIGN_IN_COMPLETE_PAGE: &str = "<html><body style='font-family:system-ui;text-align:center;padding:60px;'>\
<h2>Sign-in successful!</h2>\
<p>You can close this tab and return to Mission Control.</p>\
</body></html>";

async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<&'static str>> {
    if state.sessions.get(&params.state).is_none() {
        return Err(AppError::BadRequest("Invalid or expired session".to_string()));
    }

    let redirect_uri = state.config.google_callback_url();
    match sign_in_with_code(&state, &params.code, &redirect_uri).await {
        Ok(tokens) => {
            tracing::info!(uid = %tokens.user.uid, "Google sign-in completed via callback");
            state.sessions.complete(&params.state, tokens);
            Ok(Html(SIGN_IN_COMPLETE_PAGE))
        }
        Err(e) => {
            state.sessions.fail(&params.state, "Authentication failed");
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PollParams {
    session_id: String,
}

/// Result of polling a sign-in session.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollResponse {
    Pending,
    Error { detail: String },
    Complete(AuthTokens),
}

async fn google_poll(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PollParams>,
) -> Result<Json<PollResponse>> {
    state.sessions.prune_expired();

    let status = state
        .sessions
        .take_finished(&params.session_id)
        .ok_or_else(|| AppError::NotFound("Session not found or expired".to_string()))?;

    Ok(Json(match status {
        SessionStatus::Pending => PollResponse::Pending,
        SessionStatus::Failed(detail) => PollResponse::Error { detail },
        SessionStatus::Complete(tokens) => PollResponse::Complete(*tokens),
    }))
}

// ─── Emulator sign-in ────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct DevSignInRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Sign in against the Auth emulator, creating the account on first use.
async fn dev_sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DevSignInRequest>,
) -> Result<Json<AuthTokens>> {
    if !state.identity_toolkit.is_emulator() {
        return Err(AppError::NotFound("Not available in production".to_string()));
    }
    body.validate()?;

    let display_name = body
        .display_name
        .clone()
        .unwrap_or_else(|| body.email.split('@').next().unwrap_or_default().to_string());

    let session = match state
        .identity_toolkit
        .sign_up(&body.email, DEV_PASSWORD, &display_name)
        .await
    {
        Ok(session) => session,
        Err(AppError::Upstream(_)) => state
            .identity_toolkit
            .sign_in_with_password(&body.email, DEV_PASSWORD)
            .await
            .map_err(|e| match e {
                AppError::Upstream(msg) => {
                    AppError::BadRequest(format!("Emulator auth failed: {}", msg))
                }
                other => other,
            })?,
        Err(e) => return Err(e),
    };

    let user = Repository::users(state.db.clone())
        .create_or_update(&session.local_id, &body.email, Some(display_name), None)
        .await?;

    tracing::info!(uid = %user.firebase_uid, "Dev sign-in completed");

    Ok(Json(AuthTokens {
        id_token: session.id_token,
        refresh_token: session.refresh_token,
        user: user.into(),
    }))
}

// ─── Current user ────────────────────────────────────────────

/// Stored profile, or the token's identity when no record exists yet.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserProfile>> {
    let stored = Repository::users(state.db.clone())
        .get_by_firebase_uid(&user.uid)
        .await?;

    Ok(Json(match stored {
        Some(record) => record.into(),
        None => UserProfile {
            uid: user.uid,
            email: user.email.unwrap_or_default(),
            display_name: None,
            avatar_url: None,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_response_shapes() {
        assert_eq!(
            serde_json::to_value(PollResponse::Pending).unwrap(),
            serde_json::json!({"status": "pending"})
        );

        let complete = PollResponse::Complete(AuthTokens {
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
            user: UserProfile {
                uid: "u1".to_string(),
                email: "a@example.com".to_string(),
                display_name: None,
                avatar_url: None,
            },
        });
        let value = serde_json::to_value(complete).unwrap();
        assert_eq!(value["status"], "complete");
        assert_eq!(value["id_token"], "id");
        assert_eq!(value["user"]["uid"], "u1");
    }

    #[test]
    fn exchange_request_requires_code() {
        let body = ExchangeRequest {
            code: String::new(),
            redirect_uri: "http://127.0.0.1:5000".to_string(),
        };
        assert!(matches!(
            body.validate().map_err(AppError::from),
            Err(AppError::Validation(_))
        ));
    }
}

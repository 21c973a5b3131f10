// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encrypted API-key management routes.
//!
//! Every handler builds its [`CredentialService`] from the caller's uid, so
//! a request can only ever address `users/{uid}/credentials`.

use crate::db::Repository;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::CredentialView;
use crate::services::CredentialService;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/keys", get(list_keys).post(create_key))
        .route(
            "/api/keys/{id}",
            get(get_key).put(update_key).delete(delete_key),
        )
}

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "apps/desktop/src/lib/generated/")
)]
pub struct CreateKeyRequest {
    pub provider: String,
    pub name: String,
    #[validate(length(min = 8, message = "API key must be at least 8 characters"))]
    pub key: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "apps/desktop/src/lib/generated/")
)]
pub struct UpdateKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 8, message = "API key must be at least 8 characters"))]
    pub key: Option<String>,
}

fn service_for<'a>(state: &'a AppState, user: &AuthUser) -> CredentialService<'a> {
    CredentialService::new(
        state.cipher.as_deref(),
        Repository::credentials_for(state.db.clone(), &user.uid),
    )
}

async fn create_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<CredentialView>)> {
    body.validate()?;

    let view = service_for(&state, &user)
        .create(&body.provider, &body.name, &body.key)
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_keys(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<CredentialView>>> {
    Ok(Json(service_for(&state, &user).list().await?))
}

async fn get_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<CredentialView>> {
    Ok(Json(service_for(&state, &user).get(&id).await?))
}

async fn update_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateKeyRequest>,
) -> Result<Json<CredentialView>> {
    body.validate()?;

    let view = service_for(&state, &user)
        .update(&id, body.name.as_deref(), body.key.as_deref())
        .await?;

    Ok(Json(view))
}

async fn delete_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    service_for(&state, &user).delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

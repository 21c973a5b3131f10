// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Middleware that requires a verified Firebase ID token.
///
/// With the dev bypass active every request runs as the dev user. Otherwise
/// a request without a bearer token is rejected as `missing_token` and one
/// whose token fails verification as `invalid_token`.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let auth_user = match state.token_verifier.dev_identity() {
        Some(user) => user,
        None => {
            let TypedHeader(Authorization(bearer)) =
                TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &state)
                    .await
                    .map_err(|_| AppError::MissingToken)?;

            let token = bearer.token();
            if token.is_empty() {
                return Err(AppError::MissingToken);
            }

            state
                .token_verifier
                .verify(token)
                .await
                .map_err(|e| match e {
                    AppError::InvalidToken(msg) => AppError::InvalidToken(msg),
                    AppError::Upstream(msg) => AppError::Upstream(msg),
                    other => AppError::InvalidToken(other.to_string()),
                })?
        }
    };

    tracing::debug!(uid = %auth_user.uid, "Authenticated request");

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

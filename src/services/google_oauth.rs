// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth 2.0 authorization-code client.

use crate::config::Config;
use crate::error::{AppError, Result};
use anyhow::Context;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str = "openid email profile";
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Tokens returned by Google's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokens {
    pub id_token: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Google OAuth client for the sign-in flows.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl GoogleOAuthClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building Google OAuth HTTP client")?;

        Ok(Self {
            http,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
        })
    }

    /// Point the code exchange at a different token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    fn client_id(&self) -> Result<&str> {
        self.client_id
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Google OAuth not configured".to_string()))
    }

    fn client_secret(&self) -> Result<&str> {
        self.client_secret
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Google OAuth not configured".to_string()))
    }

    /// Consent-screen URL for the browser flow. `state` round-trips back to
    /// the callback.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(self.client_id()?),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
        ))
    }

    /// Exchange an authorization code for Google tokens.
    ///
    /// Anything but a 200 aborts with the provider's error body.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<GoogleTokens> {
        let client_id = self.client_id()?;
        let client_secret = self.client_secret()?;

        tracing::info!("Exchanging authorization code for Google tokens");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("token exchange request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Google token exchange rejected");
            return Err(AppError::Upstream(format!("token exchange failed: {}", body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid token response: {}", e)))
    }
}

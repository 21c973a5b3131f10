// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Identity Toolkit REST client.
//!
//! The same client talks either to Google's production endpoint or to a
//! local Auth emulator; the choice is made once when the client is built.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::google_oauth::HTTP_TIMEOUT;
use anyhow::Context;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

pub const PRODUCTION_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

/// API key the Auth emulator accepts.
const EMULATOR_API_KEY: &str = "fake-api-key";

/// Password for accounts created through the dev sign-in route.
pub const DEV_PASSWORD: &str = "dev-password-123";

/// Result of `accounts:signInWithIdp`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpSignIn {
    pub local_id: String,
    pub id_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Result of `accounts:signUp` / `accounts:signInWithPassword`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSignIn {
    pub local_id: String,
    pub id_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// One account from `accounts:lookup`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupUser {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Clone)]
pub struct IdentityToolkitClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    emulator: bool,
}

impl IdentityToolkitClient {
    /// Production or emulator client, depending on `FIREBASE_AUTH_EMULATOR_HOST`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match &config.auth_emulator_host {
            Some(host) => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                Self::emulator(host)
            }
            None => Self::production(config.firebase_api_key.clone()),
        }
    }

    pub fn production(api_key: Option<String>) -> anyhow::Result<Self> {
        Self::with_base_url(PRODUCTION_BASE_URL, api_key, false)
    }

    pub fn emulator(host: &str) -> anyhow::Result<Self> {
        Self::with_base_url(
            format!("http://{}/identitytoolkit.googleapis.com", host),
            Some(EMULATOR_API_KEY.to_string()),
            true,
        )
    }

    /// Client against an arbitrary base URL (the `/v1/accounts:*` paths are
    /// appended).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
        emulator: bool,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building Identity Toolkit HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            emulator,
        })
    }

    pub fn is_emulator(&self) -> bool {
        self.emulator
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Configuration("Firebase API key not configured".to_string())
        })?;

        self.http
            .post(format!("{}/v1/accounts:{}", self.base_url, method))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("{} request failed: {}", method, e)))
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let response = self.call(method, body).await?;

        if response.status() != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("{} failed: {}", method, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid {} response: {}", method, e)))
    }

    /// Exchange a Google ID token for a Firebase session.
    pub async fn sign_in_with_idp(
        &self,
        google_id_token: &str,
        google_access_token: Option<&str>,
        request_uri: &str,
    ) -> Result<IdpSignIn> {
        let mut post_body = format!(
            "id_token={}&providerId=google.com",
            urlencoding::encode(google_id_token)
        );
        if let Some(access_token) = google_access_token {
            post_body.push_str("&access_token=");
            post_body.push_str(&urlencoding::encode(access_token));
        }

        self.post(
            "signInWithIdp",
            json!({
                "postBody": post_body,
                "requestUri": request_uri,
                "returnIdpCredential": true,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<PasswordSignIn> {
        self.post(
            "signUp",
            json!({
                "email": email,
                "password": password,
                "displayName": display_name,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<PasswordSignIn> {
        self.post(
            "signInWithPassword",
            json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    /// Look up the account behind an ID token.
    ///
    /// A 400 (the emulator's answer to unknown or malformed tokens) and an
    /// empty user list both yield `None`.
    pub async fn lookup(&self, id_token: &str) -> Result<Option<LookupUser>> {
        let response = self.call("lookup", json!({ "idToken": id_token })).await?;

        match response.status() {
            StatusCode::OK => {
                let lookup: LookupResponse = response.json().await.map_err(|e| {
                    AppError::Upstream(format!("invalid lookup response: {}", e))
                })?;
                Ok(lookup.users.into_iter().next())
            }
            StatusCode::BAD_REQUEST => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Upstream(format!(
                    "lookup failed with status {}: {}",
                    status, body
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emulator_base_url() {
        let client = IdentityToolkitClient::emulator("localhost:9099").unwrap();
        assert!(client.is_emulator());
        assert_eq!(
            client.base_url,
            "http://localhost:9099/identitytoolkit.googleapis.com"
        );
    }

    #[test]
    fn test_from_config_prefers_emulator() {
        let mut config = Config::test_default();
        assert!(!IdentityToolkitClient::from_config(&config).unwrap().is_emulator());

        config.auth_emulator_host = Some("127.0.0.1:9099".to_string());
        assert!(IdentityToolkitClient::from_config(&config).unwrap().is_emulator());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let client = IdentityToolkitClient::production(None).unwrap();
        assert!(matches!(
            client.sign_in_with_password("a@example.com", "pw").await,
            Err(AppError::Configuration(_))
        ));
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token verification.
//!
//! One [`TokenVerifier`] is chosen at startup from configuration:
//! dev bypass, Auth emulator lookup, or RS256 verification against
//! Google's securetoken JWKS.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::identity_toolkit::IdentityToolkitClient;
use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const SECURETOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

pub const DEV_USER_UID: &str = "dev-user";
pub const DEV_USER_EMAIL: &str = "dev@localhost";

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Fixed identity that applies without any token. Only the dev bypass
    /// has one.
    fn dev_identity(&self) -> Option<AuthUser> {
        None
    }

    /// Verify a bearer token and resolve the caller.
    async fn verify(&self, token: &str) -> Result<AuthUser>;
}

/// Build the verifier for this process.
pub fn build_token_verifier(
    config: &Config,
    identity_toolkit: &IdentityToolkitClient,
) -> anyhow::Result<Arc<dyn TokenVerifier>> {
    if config.auth_disabled {
        tracing::warn!("AUTH_DISABLED is set; every request runs as the dev user");
        return Ok(Arc::new(DevBypassVerifier));
    }

    if identity_toolkit.is_emulator() {
        tracing::info!("Verifying ID tokens against the Firebase Auth emulator");
        return Ok(Arc::new(EmulatorTokenVerifier::new(identity_toolkit.clone())));
    }

    Ok(Arc::new(FirebaseTokenVerifier::new(&config.firebase_project_id)?))
}

/// Accepts everything as the dev user.
pub struct DevBypassVerifier;

impl DevBypassVerifier {
    fn identity() -> AuthUser {
        AuthUser {
            uid: DEV_USER_UID.to_string(),
            email: Some(DEV_USER_EMAIL.to_string()),
        }
    }
}

#[async_trait]
impl TokenVerifier for DevBypassVerifier {
    fn dev_identity(&self) -> Option<AuthUser> {
        Some(Self::identity())
    }

    async fn verify(&self, _token: &str) -> Result<AuthUser> {
        Ok(Self::identity())
    }
}

/// Resolves tokens through the emulator's `accounts:lookup`. The emulator
/// issues unsigned tokens, so there is nothing to check locally.
pub struct EmulatorTokenVerifier {
    client: IdentityToolkitClient,
}

impl EmulatorTokenVerifier {
    pub fn new(client: IdentityToolkitClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenVerifier for EmulatorTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser> {
        let user = self
            .client
            .lookup(token)
            .await?
            .ok_or_else(|| AppError::InvalidToken("no emulator account for token".to_string()))?;

        Ok(AuthUser {
            uid: user.local_id,
            email: user.email,
        })
    }
}

#[derive(Clone)]
enum VerifierMode {
    Jwks { url: String },
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifies Firebase-issued RS256 ID tokens.
pub struct FirebaseTokenVerifier {
    http_client: reqwest::Client,
    project_id: String,
    issuer: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl FirebaseTokenVerifier {
    pub fn new(project_id: &str) -> anyhow::Result<Self> {
        Self::with_mode(
            project_id,
            VerifierMode::Jwks {
                url: SECURETOKEN_JWKS_URL.to_string(),
            },
        )
    }

    /// Fetch keys from a different JWKS endpoint.
    pub fn with_jwks_url(project_id: &str, url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_mode(project_id, VerifierMode::Jwks { url: url.into() })
    }

    /// Verifier with a single fixed RSA public key, for tests.
    pub fn new_with_static_key(
        project_id: &str,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static key kid must not be empty");
        }

        Self::with_mode(
            project_id,
            VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        )
    }

    fn with_mode(project_id: &str, mode: VerifierMode) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        let issuer = format!("https://securetoken.google.com/{}", project_id);
        tracing::info!(issuer = %issuer, "Initialized Firebase ID token verifier");

        Ok(Self {
            http_client,
            project_id: project_id.to_string(),
            issuer,
            mode,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>> {
        let url = match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }
                return Err(AppError::InvalidToken(format!("unknown JWT kid: {kid}")));
            }
            VerifierMode::Jwks { url } => url,
        };

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // Keys rotate; a miss after a normal refresh forces one more fetch.
        for force_refresh in [false, true] {
            self.refresh_jwks(url, force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(AppError::InvalidToken(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, url: &str, force_refresh: bool) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_uri = %url, "Refreshing securetoken JWKS cache");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err(AppError::Upstream(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Securetoken JWKS cache refreshed");
        Ok(())
    }
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser> {
        let header = decode_header(token)
            .map_err(|e| AppError::InvalidToken(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::InvalidToken(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AppError::InvalidToken("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<FirebaseIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| AppError::InvalidToken(format!("JWT validation failed: {e}")))?
            .claims;

        validate_iat(claims.iat)?;

        if claims.sub.is_empty() {
            return Err(AppError::InvalidToken("empty sub claim".to_string()));
        }

        Ok(AuthUser {
            uid: claims.sub,
            email: claims.email,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirebaseIdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
}

fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

fn validate_iat(iat: Option<u64>) -> Result<()> {
    let Some(iat) = iat else {
        return Err(AppError::InvalidToken("missing iat claim".to_string()));
    };

    if iat > now_unix_secs() + CLOCK_SKEW_SECS {
        return Err(AppError::InvalidToken("iat claim is in the future".to_string()));
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse::<u64>().ok())
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup into an immutable [`Config`]. Optional
//! values (OAuth client, encryption key) are only required by the routes that
//! use them, which report a configuration error at first use.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Firebase / GCP project ID
    pub firebase_project_id: String,
    /// Google OAuth client ID (public)
    pub google_client_id: Option<String>,
    /// Firebase Web API key used for Identity Toolkit calls
    pub firebase_api_key: Option<String>,
    /// Externally reachable base URL of this API (OAuth callback host)
    pub api_base_url: String,
    /// Extra frontend origin allowed by CORS
    pub frontend_url: Option<String>,
    /// Server port
    pub port: u16,
    /// Skip token verification and use a fixed dev identity
    pub auth_disabled: bool,
    /// `host:port` of the Firestore emulator, if any
    pub firestore_emulator_host: Option<String>,
    /// `host:port` of the Firebase Auth emulator, if any
    pub auth_emulator_host: Option<String>,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: Option<String>,
    /// Base64-encoded 32-byte AES key for credential encryption
    pub credential_encryption_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = match optional_var("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                reason: format!("'{}' is not a valid port", raw),
            })?,
            None => 8000,
        };

        let auth_disabled = match optional_var("AUTH_DISABLED") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "AUTH_DISABLED",
                reason: format!("'{}' is not a boolean", raw),
            })?,
            None => false,
        };

        let google_client_id = optional_var("GOOGLE_CLIENT_ID");

        Ok(Self {
            firebase_project_id: optional_var("FIREBASE_PROJECT_ID")
                .unwrap_or_else(|| "mcontrol-dev".to_string()),
            firebase_api_key: optional_var("FIREBASE_API_KEY").or_else(|| google_client_id.clone()),
            google_client_id,
            api_base_url: optional_var("API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            frontend_url: optional_var("FRONTEND_URL"),
            port,
            auth_disabled,
            firestore_emulator_host: optional_var("FIRESTORE_EMULATOR_HOST"),
            auth_emulator_host: optional_var("FIREBASE_AUTH_EMULATOR_HOST"),
            google_client_secret: optional_var("GOOGLE_CLIENT_SECRET"),
            credential_encryption_key: optional_var("CREDENTIAL_ENCRYPTION_KEY"),
        })
    }

    /// Deterministic configuration for tests.
    ///
    /// Auth is enabled, no emulators are configured and the encryption key is
    /// a fixed all-`0x2a` key.
    pub fn test_default() -> Self {
        Self {
            firebase_project_id: "test-project".to_string(),
            google_client_id: Some("test-client-id.apps.googleusercontent.com".to_string()),
            firebase_api_key: Some("test-api-key".to_string()),
            api_base_url: "http://localhost:8000".to_string(),
            frontend_url: None,
            port: 8000,
            auth_disabled: false,
            firestore_emulator_host: None,
            auth_emulator_host: None,
            google_client_secret: Some("test-client-secret".to_string()),
            // base64 of [0x2a; 32]
            credential_encryption_key: Some(
                "KioqKioqKioqKioqKioqKioqKioqKioqKioqKioqKio=".to_string(),
            ),
        }
    }

    /// URL Google redirects back to in the browser sign-in flow.
    pub fn google_callback_url(&self) -> String {
        format!("{}/api/auth/google/callback", self.api_base_url)
    }
}

/// Read an environment variable, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("FIREBASE_PROJECT_ID", "env-project");
        env::set_var("AUTH_DISABLED", "yes");
        env::set_var("API_BASE_URL", "https://api.example.com/");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.firebase_project_id, "env-project");
        assert!(config.auth_disabled);
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(
            config.google_callback_url(),
            "https://api.example.com/api/auth/google/callback"
        );

        env::remove_var("FIREBASE_PROJECT_ID");
        env::remove_var("AUTH_DISABLED");
        env::remove_var("API_BASE_URL");
    }
}

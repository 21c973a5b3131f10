// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth_sessions;
pub mod credentials;
pub mod crypto;
pub mod google_oauth;
pub mod identity_toolkit;
pub mod token_verifier;

pub use auth_sessions::{AuthSessionStore, Clock, ManualClock, SessionStatus, SystemClock};
pub use credentials::CredentialService;
pub use crypto::{CredentialCipher, CryptoError};
pub use google_oauth::GoogleOAuthClient;
pub use identity_toolkit::IdentityToolkitClient;
pub use token_verifier::{build_token_verifier, TokenVerifier};

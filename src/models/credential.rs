// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encrypted API credential model.

use crate::db::{collections, Document};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Credential stored at `users/{uid}/credentials/{id}`.
///
/// `encrypted_key` is an AES-256-GCM blob and is never serialized into an
/// API response; use [`CredentialView`] for that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential ID (also used as document ID)
    pub id: String,
    /// Free-form provider tag, e.g. "anthropic"
    pub provider: String,
    /// User-chosen display name
    pub name: String,
    /// `base64(nonce || ciphertext || tag)`, or empty once wiped
    pub encrypted_key: String,
    /// Masked hint such as `sk-...f456`
    pub key_suffix: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Document for Credential {
    const COLLECTION: &'static str = collections::CREDENTIALS;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Display-safe view of a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "apps/desktop/src/lib/generated/")
)]
pub struct CredentialView {
    pub id: String,
    pub provider: String,
    pub name: String,
    pub key_hint: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Credential> for CredentialView {
    fn from(doc: Credential) -> Self {
        Self {
            id: doc.id,
            provider: doc.provider,
            name: doc.name,
            key_hint: doc.key_suffix,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

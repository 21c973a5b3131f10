// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential lifecycle: encrypt-then-store, re-encrypt on update,
//! overwrite-then-delete.
//!
//! The service is built per request from a repository scoped to the caller's
//! user, so every operation addresses `users/{uid}/credentials` only.

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Credential, CredentialView};
use crate::services::crypto::{mask_key, CredentialCipher};
use crate::time_utils::now_rfc3339;

/// Shortest accepted secret, in characters.
pub const MIN_SECRET_LEN: usize = 8;

/// Maximum number of credentials returned by a listing.
pub const LIST_LIMIT: u32 = 50;

/// Reject secrets shorter than [`MIN_SECRET_LEN`].
pub fn validate_secret(secret: &str) -> Result<()> {
    if secret.chars().count() < MIN_SECRET_LEN {
        return Err(AppError::Validation(format!(
            "API key must be at least {} characters",
            MIN_SECRET_LEN
        )));
    }
    Ok(())
}

/// Credential operations for one user.
pub struct CredentialService<'a> {
    cipher: Option<&'a CredentialCipher>,
    repo: Repository<Credential>,
}

impl<'a> CredentialService<'a> {
    pub fn new(cipher: Option<&'a CredentialCipher>, repo: Repository<Credential>) -> Self {
        Self { cipher, repo }
    }

    fn cipher(&self) -> Result<&'a CredentialCipher> {
        self.cipher.ok_or_else(|| {
            AppError::Configuration("Credential encryption is not configured".to_string())
        })
    }

    fn not_found() -> AppError {
        AppError::NotFound("Credential not found".to_string())
    }

    async fn load(&self, id: &str) -> Result<Credential> {
        self.repo.get(id).await?.ok_or_else(Self::not_found)
    }

    /// Encrypt and store a new credential.
    pub async fn create(&self, provider: &str, name: &str, secret: &str) -> Result<CredentialView> {
        validate_secret(secret)?;
        let cipher = self.cipher()?;

        let now = now_rfc3339();
        let doc = Credential {
            id: uuid::Uuid::new_v4().to_string(),
            provider: provider.to_string(),
            name: name.to_string(),
            encrypted_key: cipher.encrypt(secret)?,
            key_suffix: mask_key(secret),
            created_at: now.clone(),
            updated_at: now,
        };

        self.repo.set(&doc).await?;

        tracing::info!(credential_id = %doc.id, provider = %doc.provider, "Credential created");
        Ok(doc.into())
    }

    pub async fn list(&self) -> Result<Vec<CredentialView>> {
        Ok(self
            .repo
            .list(LIST_LIMIT)
            .await?
            .into_iter()
            .map(CredentialView::from)
            .collect())
    }

    pub async fn get(&self, id: &str) -> Result<CredentialView> {
        Ok(self.load(id).await?.into())
    }

    /// Rename and/or replace the secret.
    ///
    /// All changes land in one document write, conditioned on the document
    /// still existing. Without a new secret the stored ciphertext is left
    /// untouched.
    pub async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        secret: Option<&str>,
    ) -> Result<CredentialView> {
        if let Some(secret) = secret {
            validate_secret(secret)?;
        }

        let mut doc = self.load(id).await?;

        if let Some(name) = name {
            doc.name = name.to_string();
        }

        if let Some(secret) = secret {
            let cipher = self.cipher()?;
            doc.encrypted_key = cipher.encrypt(secret)?;
            doc.key_suffix = mask_key(secret);
        }

        doc.updated_at = now_rfc3339();
        if !self.repo.update_existing(&doc).await? {
            return Err(Self::not_found());
        }

        tracing::info!(
            credential_id = %doc.id,
            reencrypted = secret.is_some(),
            "Credential updated"
        );
        Ok(doc.into())
    }

    /// Wipe the stored ciphertext, then remove the document.
    ///
    /// The two writes are not atomic; a failure in between leaves a record
    /// with an empty `encrypted_key`, which [`reveal`](Self::reveal) treats
    /// as gone.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut doc = self.load(id).await?;

        doc.encrypted_key = String::new();
        doc.updated_at = now_rfc3339();
        if !self.repo.update_existing(&doc).await? {
            return Err(Self::not_found());
        }

        if !self.repo.delete(id).await? {
            return Err(Self::not_found());
        }

        tracing::info!(credential_id = %id, "Credential deleted");
        Ok(())
    }

    /// Decrypt a stored secret for server-side use. Never exposed over HTTP.
    pub async fn reveal(&self, id: &str) -> Result<String> {
        let doc = self.load(id).await?;
        if doc.encrypted_key.is_empty() {
            return Err(Self::not_found());
        }
        Ok(self.cipher()?.decrypt(&doc.encrypted_key)?)
    }
}

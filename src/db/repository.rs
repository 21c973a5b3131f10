// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed repository bound to a single collection path.
//!
//! A repository is either rooted (`users`) or scoped to one parent document
//! (`users/{uid}/credentials`). Scoped repositories can only address
//! documents under their own parent.

use crate::db::{collections, Document, FirestoreDb, ParentPath};
use crate::error::AppError;
use crate::models::User;
use crate::time_utils::now_rfc3339;
use std::marker::PhantomData;

/// Repository over documents of type `T`.
pub struct Repository<T: Document> {
    db: FirestoreDb,
    parent: Option<ParentPath>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            parent: self.parent.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    /// Repository over a top-level collection.
    pub fn root(db: FirestoreDb) -> Self {
        Self {
            db,
            parent: None,
            _marker: PhantomData,
        }
    }

    /// Repository over `T::COLLECTION` under `{parent_collection}/{parent_id}`.
    pub fn child(db: FirestoreDb, parent_collection: &'static str, parent_id: &str) -> Self {
        Self {
            db,
            parent: Some(ParentPath::new(parent_collection, parent_id)),
            _marker: PhantomData,
        }
    }

    pub fn parent(&self) -> Option<&ParentPath> {
        self.parent.as_ref()
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, AppError> {
        self.db.get(self.parent.as_ref(), id).await
    }

    /// Create or overwrite the document keyed by `doc.id()`.
    pub async fn set(&self, doc: &T) -> Result<(), AppError> {
        self.db.set(self.parent.as_ref(), doc).await
    }

    /// Overwrite the document only if it still exists; `false` when it is gone.
    pub async fn update_existing(&self, doc: &T) -> Result<bool, AppError> {
        self.db.update_existing(self.parent.as_ref(), doc).await
    }

    pub async fn list(&self, limit: u32) -> Result<Vec<T>, AppError> {
        self.db.list(self.parent.as_ref(), limit).await
    }

    /// Delete by ID, returning whether the document existed.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        self.db.delete::<T>(self.parent.as_ref(), id).await
    }
}

// ─── User Operations ─────────────────────────────────────────

impl Repository<User> {
    pub fn users(db: FirestoreDb) -> Self {
        Self::root(db)
    }

    /// Get a user by Firebase UID (the document ID).
    pub async fn get_by_firebase_uid(&self, firebase_uid: &str) -> Result<Option<User>, AppError> {
        self.get(firebase_uid).await
    }

    /// Get the first user with this email address.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .db
            .find_by_field::<User>(self.parent.as_ref(), "email", email, 1)
            .await?
            .into_iter()
            .next())
    }

    /// Create or refresh a user from a fresh identity assertion.
    ///
    /// Email, display name and avatar are overwritten; `created_at` is kept.
    /// Repeating the call with the same input converges to the same record.
    pub async fn create_or_update(
        &self,
        firebase_uid: &str,
        email: &str,
        display_name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, AppError> {
        let now = now_rfc3339();
        let created_at = self
            .get(firebase_uid)
            .await?
            .map(|existing| existing.created_at)
            .unwrap_or_else(|| now.clone());

        let user = User {
            firebase_uid: firebase_uid.to_string(),
            email: email.to_string(),
            display_name,
            avatar_url,
            created_at,
            updated_at: now,
        };

        self.set(&user).await?;
        tracing::info!(uid = %firebase_uid, "User record upserted");

        Ok(user)
    }
}

impl Repository<crate::models::Credential> {
    /// Credentials owned by one user.
    pub fn credentials_for(db: FirestoreDb, uid: &str) -> Self {
        Self::child(db, collections::USERS, uid)
    }
}

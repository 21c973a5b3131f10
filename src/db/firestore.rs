// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed document operations.
//!
//! The backend is picked once at construction:
//! - Firestore (production, or the emulator when `FIRESTORE_EMULATOR_HOST` is set)
//! - in-memory (local runs and tests)
//! - offline (every operation fails; used to exercise error paths)

use crate::db::{Document, ParentPath};
use crate::error::AppError;
use dashmap::DashMap;
use std::sync::Arc;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    /// Documents as JSON keyed by full path (`users/u1/credentials/c1`).
    Memory(Arc<DashMap<String, serde_json::Value>>),
    Offline,
}

fn db_err(e: impl std::fmt::Display) -> AppError {
    AppError::Database(e.to_string())
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, pass the emulator host.
    pub async fn new(project_id: &str, emulator_host: Option<&str>) -> Result<Self, AppError> {
        // If the emulator is configured, use an unauthenticated connection
        // to avoid local credential warnings and leakage.
        if let Some(host) = emulator_host {
            return Self::create_emulator_client(project_id, host).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str, host: &str) -> Result<Self, AppError> {
        tracing::info!(host, "Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        // The firestore crate routes to FIRESTORE_EMULATOR_HOST on its own.
        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create an in-memory document store.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(DashMap::new())),
        }
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            backend: Backend::Offline,
        }
    }

    fn offline() -> AppError {
        AppError::Database("Database not connected (offline mode)".to_string())
    }

    fn collection_path<T: Document>(parent: Option<&ParentPath>) -> String {
        match parent {
            Some(p) => format!("{}/{}/{}", p.collection, p.id, T::COLLECTION),
            None => T::COLLECTION.to_string(),
        }
    }

    fn document_path<T: Document>(parent: Option<&ParentPath>, id: &str) -> String {
        format!("{}/{}", Self::collection_path::<T>(parent), id)
    }

    fn parent_path(
        client: &firestore::FirestoreDb,
        parent: &ParentPath,
    ) -> Result<firestore::ParentPathBuilder, AppError> {
        client
            .parent_path(parent.collection, &parent.id)
            .map_err(db_err)
    }

    /// Fetch a document by ID.
    pub async fn get<T: Document>(
        &self,
        parent: Option<&ParentPath>,
        id: &str,
    ) -> Result<Option<T>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => match parent {
                Some(p) => {
                    let parent_path = Self::parent_path(client, p)?;
                    client
                        .fluent()
                        .select()
                        .by_id_in(T::COLLECTION)
                        .parent(&parent_path)
                        .obj()
                        .one(id)
                        .await
                        .map_err(db_err)
                }
                None => client
                    .fluent()
                    .select()
                    .by_id_in(T::COLLECTION)
                    .obj()
                    .one(id)
                    .await
                    .map_err(db_err),
            },
            Backend::Memory(docs) => docs
                .get(&Self::document_path::<T>(parent, id))
                .map(|entry| serde_json::from_value(entry.value().clone()).map_err(db_err))
                .transpose(),
            Backend::Offline => Err(Self::offline()),
        }
    }

    /// Create or overwrite a document in a single write.
    pub async fn set<T: Document>(&self, parent: Option<&ParentPath>, doc: &T) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                match parent {
                    Some(p) => {
                        let parent_path = Self::parent_path(client, p)?;
                        let _: () = client
                            .fluent()
                            .update()
                            .in_col(T::COLLECTION)
                            .document_id(doc.id())
                            .parent(&parent_path)
                            .object(doc)
                            .execute()
                            .await
                            .map_err(db_err)?;
                    }
                    None => {
                        let _: () = client
                            .fluent()
                            .update()
                            .in_col(T::COLLECTION)
                            .document_id(doc.id())
                            .object(doc)
                            .execute()
                            .await
                            .map_err(db_err)?;
                    }
                }
                Ok(())
            }
            Backend::Memory(docs) => {
                let value = serde_json::to_value(doc).map_err(db_err)?;
                docs.insert(Self::document_path::<T>(parent, doc.id()), value);
                Ok(())
            }
            Backend::Offline => Err(Self::offline()),
        }
    }

    /// Overwrite a document only if it still exists.
    ///
    /// Returns `false` without writing when the document is gone, so a
    /// concurrent delete can never be undone by a late update.
    pub async fn update_existing<T: Document>(
        &self,
        parent: Option<&ParentPath>,
        doc: &T,
    ) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let builder = client
                    .fluent()
                    .update()
                    .in_col(T::COLLECTION)
                    .precondition(firestore::FirestoreWritePrecondition::Exists(true))
                    .document_id(doc.id());

                let result: Result<(), firestore::errors::FirestoreError> = match parent {
                    Some(p) => {
                        let parent_path = Self::parent_path(client, p)?;
                        builder.parent(&parent_path).object(doc).execute().await
                    }
                    None => builder.object(doc).execute().await,
                };

                match result {
                    Ok(()) => Ok(true),
                    Err(firestore::errors::FirestoreError::DataNotFoundError(_)) => Ok(false),
                    Err(e) => Err(db_err(e)),
                }
            }
            Backend::Memory(docs) => {
                let value = serde_json::to_value(doc).map_err(db_err)?;
                match docs.get_mut(&Self::document_path::<T>(parent, doc.id())) {
                    Some(mut entry) => {
                        *entry = value;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            Backend::Offline => Err(Self::offline()),
        }
    }

    /// List up to `limit` documents of a collection, ordered by document ID.
    pub async fn list<T: Document>(
        &self,
        parent: Option<&ParentPath>,
        limit: u32,
    ) -> Result<Vec<T>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => match parent {
                Some(p) => {
                    let parent_path = Self::parent_path(client, p)?;
                    client
                        .fluent()
                        .select()
                        .from(T::COLLECTION)
                        .parent(&parent_path)
                        .limit(limit)
                        .obj()
                        .query()
                        .await
                        .map_err(db_err)
                }
                None => client
                    .fluent()
                    .select()
                    .from(T::COLLECTION)
                    .limit(limit)
                    .obj()
                    .query()
                    .await
                    .map_err(db_err),
            },
            Backend::Memory(docs) => {
                let prefix = format!("{}/", Self::collection_path::<T>(parent));
                let mut entries: Vec<(String, serde_json::Value)> = docs
                    .iter()
                    .filter(|entry| {
                        entry
                            .key()
                            .strip_prefix(&prefix)
                            .is_some_and(|rest| !rest.contains('/'))
                    })
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));

                entries
                    .into_iter()
                    .take(limit as usize)
                    .map(|(_, value)| serde_json::from_value(value).map_err(db_err))
                    .collect()
            }
            Backend::Offline => Err(Self::offline()),
        }
    }

    /// Find documents whose string field equals `value`.
    pub async fn find_by_field<T: Document>(
        &self,
        parent: Option<&ParentPath>,
        field: &'static str,
        value: &str,
        limit: u32,
    ) -> Result<Vec<T>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let value = value.to_string();
                match parent {
                    Some(p) => {
                        let parent_path = Self::parent_path(client, p)?;
                        client
                            .fluent()
                            .select()
                            .from(T::COLLECTION)
                            .parent(&parent_path)
                            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
                            .limit(limit)
                            .obj()
                            .query()
                            .await
                            .map_err(db_err)
                    }
                    None => client
                        .fluent()
                        .select()
                        .from(T::COLLECTION)
                        .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
                        .limit(limit)
                        .obj()
                        .query()
                        .await
                        .map_err(db_err),
                }
            }
            Backend::Memory(_) => {
                let all: Vec<T> = self.list(parent, u32::MAX).await?;
                let mut matches = Vec::new();
                for doc in all {
                    let json = serde_json::to_value(&doc).map_err(db_err)?;
                    if json.get(field).and_then(|v| v.as_str()) == Some(value) {
                        matches.push(doc);
                        if matches.len() >= limit as usize {
                            break;
                        }
                    }
                }
                Ok(matches)
            }
            Backend::Offline => Err(Self::offline()),
        }
    }

    /// Remove a document. Returns whether it existed.
    pub async fn delete<T: Document>(
        &self,
        parent: Option<&ParentPath>,
        id: &str,
    ) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                if self.get::<T>(parent, id).await?.is_none() {
                    return Ok(false);
                }

                match parent {
                    Some(p) => {
                        let parent_path = Self::parent_path(client, p)?;
                        client
                            .fluent()
                            .delete()
                            .from(T::COLLECTION)
                            .document_id(id)
                            .parent(&parent_path)
                            .execute()
                            .await
                            .map_err(db_err)?;
                    }
                    None => {
                        client
                            .fluent()
                            .delete()
                            .from(T::COLLECTION)
                            .document_id(id)
                            .execute()
                            .await
                            .map_err(db_err)?;
                    }
                }
                Ok(true)
            }
            Backend::Memory(docs) => Ok(docs
                .remove(&Self::document_path::<T>(parent, id))
                .is_some()),
            Backend::Offline => Err(Self::offline()),
        }
    }

    /// Cheap round trip used by the readiness probe.
    pub async fn ping(&self) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                client
                    .fluent()
                    .select()
                    .from(crate::db::collections::USERS)
                    .limit(1)
                    .query()
                    .await
                    .map_err(db_err)?;
                Ok(())
            }
            Backend::Memory(_) => Ok(()),
            Backend::Offline => Err(Self::offline()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credential;

    fn credential(id: &str) -> Credential {
        Credential {
            id: id.to_string(),
            provider: "openai".to_string(),
            name: format!("key {}", id),
            encrypted_key: "blob".to_string(),
            key_suffix: "sk-...1234".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_subcollections_are_isolated() {
        let db = FirestoreDb::in_memory();
        let alice = ParentPath::new("users", "alice");
        let bob = ParentPath::new("users", "bob");

        db.set(Some(&alice), &credential("a1")).await.unwrap();
        db.set(Some(&alice), &credential("a2")).await.unwrap();
        db.set(Some(&bob), &credential("b1")).await.unwrap();

        let alice_docs: Vec<Credential> = db.list(Some(&alice), 50).await.unwrap();
        assert_eq!(
            alice_docs.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["a1", "a2"]
        );

        let cross: Option<Credential> = db.get(Some(&bob), "a1").await.unwrap();
        assert!(cross.is_none());
    }

    #[tokio::test]
    async fn test_memory_delete_reports_existence() {
        let db = FirestoreDb::in_memory();
        let parent = ParentPath::new("users", "u");

        db.set(Some(&parent), &credential("c1")).await.unwrap();
        assert!(db.delete::<Credential>(Some(&parent), "c1").await.unwrap());
        assert!(!db.delete::<Credential>(Some(&parent), "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_update_existing_never_creates() {
        let db = FirestoreDb::in_memory();
        let parent = ParentPath::new("users", "u");

        assert!(!db.update_existing(Some(&parent), &credential("c1")).await.unwrap());
        let missing: Option<Credential> = db.get(Some(&parent), "c1").await.unwrap();
        assert!(missing.is_none());

        db.set(Some(&parent), &credential("c1")).await.unwrap();
        let mut renamed = credential("c1");
        renamed.name = "renamed".to_string();
        assert!(db.update_existing(Some(&parent), &renamed).await.unwrap());
        let stored: Credential = db.get(Some(&parent), "c1").await.unwrap().unwrap();
        assert_eq!(stored.name, "renamed");
    }

    #[tokio::test]
    async fn test_offline_fails() {
        let db = FirestoreDb::new_mock();
        assert!(matches!(db.ping().await, Err(AppError::Database(_))));
        assert!(db.get::<Credential>(None, "x").await.is_err());
    }
}

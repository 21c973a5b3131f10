//! Database layer (Firestore).

pub mod firestore;
pub mod repository;

pub use firestore::FirestoreDb;
pub use repository::Repository;

use serde::{de::DeserializeOwned, Serialize};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Sub-collection under `users/{uid}`
    pub const CREDENTIALS: &str = "credentials";
}

/// A model that can be stored as a document.
///
/// The serialized form is the document's field mapping; `id()` is the
/// document ID within [`COLLECTION`](Self::COLLECTION).
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// Parent document of a sub-collection, e.g. `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentPath {
    pub collection: &'static str,
    pub id: String,
}

impl ParentPath {
    pub fn new(collection: &'static str, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

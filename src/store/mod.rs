//! Document store seam. Handlers only ever see `dyn DocumentStore`, so the
//! MongoDB adapter and the in-process store are interchangeable.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use mongodb::bson::Document;
use thiserror::Error;

use crate::models::{Collaborator, Project};
use crate::pipeline::{Pipeline, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionName {
    Projects,
    Collaborators,
}

impl CollectionName {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionName::Projects => "projects",
            CollectionName::Collaborators => "collaborators",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("could not encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    #[error("could not decode document: {0}")]
    Decode(#[from] mongodb::bson::de::Error),
    #[error("{0}")]
    DuplicateKey(String),
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Case-insensitive substring match on any of `fields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSearch {
    pub fields: Vec<&'static str>,
    pub needle: String,
}

/// Filter, ordering and window for a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindQuery {
    pub search: Option<TextSearch>,
    pub sort: Option<(String, SortOrder)>,
    pub skip: u64,
    pub limit: u64,
}

impl Default for FindQuery {
    fn default() -> Self {
        Self {
            search: None,
            sort: None,
            skip: 0,
            limit: 100,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>>;
    async fn list_projects(&self, query: &FindQuery) -> StoreResult<Vec<Project>>;
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;
    /// Replaces the whole stored document. Returns false when no project has that id.
    async fn save_project(&self, project: &Project) -> StoreResult<bool>;
    async fn delete_project(&self, id: &str) -> StoreResult<bool>;
    async fn count_projects(&self) -> StoreResult<u64>;

    async fn find_collaborator(&self, id: &str) -> StoreResult<Option<Collaborator>>;
    async fn find_collaborator_by_email(&self, email: &str) -> StoreResult<Option<Collaborator>>;
    async fn list_collaborators(&self, query: &FindQuery) -> StoreResult<Vec<Collaborator>>;
    async fn insert_collaborator(&self, collaborator: &Collaborator) -> StoreResult<()>;
    async fn save_collaborator(&self, collaborator: &Collaborator) -> StoreResult<bool>;
    async fn delete_collaborator(&self, id: &str) -> StoreResult<bool>;
    async fn count_collaborators(&self) -> StoreResult<u64>;

    async fn aggregate(
        &self,
        collection: CollectionName,
        pipeline: &Pipeline,
    ) -> StoreResult<Vec<Document>>;
}

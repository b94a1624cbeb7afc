use async_trait::async_trait;
use futures::stream::TryStreamExt;
use log::info;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};

use super::{CollectionName, DocumentStore, FindQuery, StoreError, StoreResult, TextSearch};
use crate::models::{Collaborator, Project};
use crate::pipeline::{Pipeline, SortOrder};

const DUPLICATE_KEY_CODE: i32 = 11000;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connects and makes sure the collaborator email index exists.
    pub async fn init(uri: &str, db_name: &str) -> StoreResult<Self> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let store = MongoStore {
            db: client.database(db_name),
        };

        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        store.collaborators().create_index(unique_email).await?;
        info!("Connected to MongoDB database {}", db_name);

        Ok(store)
    }

    fn projects(&self) -> Collection<Project> {
        self.db.collection(CollectionName::Projects.as_str())
    }

    fn collaborators(&self) -> Collection<Collaborator> {
        self.db.collection(CollectionName::Collaborators.as_str())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY_CODE
    )
}

fn search_filter(search: &TextSearch) -> Document {
    let pattern = regex::escape(&search.needle);
    let clauses: Vec<Document> = search
        .fields
        .iter()
        .map(|field| {
            let mut clause = Document::new();
            clause.insert(*field, doc! { "$regex": &pattern, "$options": "i" });
            clause
        })
        .collect();
    doc! { "$or": clauses }
}

async fn find_many<T>(coll: &Collection<T>, query: &FindQuery) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    let filter = query.search.as_ref().map(search_filter).unwrap_or_default();
    let mut action = coll
        .find(filter)
        .skip(query.skip)
        .limit(i64::try_from(query.limit).unwrap_or(i64::MAX));
    if let Some((field, order)) = &query.sort {
        let mut sort = Document::new();
        sort.insert(
            field.as_str(),
            match order {
                SortOrder::Ascending => 1,
                SortOrder::Descending => -1,
            },
        );
        action = action.sort(sort);
    }
    Ok(action.await?.try_collect().await?)
}

async fn replace_by_id<T>(coll: &Collection<T>, id: &str, value: &T) -> StoreResult<bool>
where
    T: Serialize + Send + Sync,
{
    let res = coll.replace_one(doc! { "_id": id }, value).await?;
    Ok(res.matched_count == 1)
}

async fn delete_by_id<T>(coll: &Collection<T>, id: &str) -> StoreResult<bool>
where
    T: Send + Sync,
{
    let res = coll.delete_one(doc! { "_id": id }).await?;
    Ok(res.deleted_count == 1)
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>> {
        Ok(self.projects().find_one(doc! { "_id": id }).await?)
    }

    async fn list_projects(&self, query: &FindQuery) -> StoreResult<Vec<Project>> {
        find_many(&self.projects(), query).await
    }

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.projects().insert_one(project).await?;
        Ok(())
    }

    async fn save_project(&self, project: &Project) -> StoreResult<bool> {
        replace_by_id(&self.projects(), &project.id, project).await
    }

    async fn delete_project(&self, id: &str) -> StoreResult<bool> {
        delete_by_id(&self.projects(), id).await
    }

    async fn count_projects(&self) -> StoreResult<u64> {
        Ok(self.projects().count_documents(doc! {}).await?)
    }

    async fn find_collaborator(&self, id: &str) -> StoreResult<Option<Collaborator>> {
        Ok(self.collaborators().find_one(doc! { "_id": id }).await?)
    }

    async fn find_collaborator_by_email(&self, email: &str) -> StoreResult<Option<Collaborator>> {
        Ok(self.collaborators().find_one(doc! { "email": email }).await?)
    }

    async fn list_collaborators(&self, query: &FindQuery) -> StoreResult<Vec<Collaborator>> {
        find_many(&self.collaborators(), query).await
    }

    async fn insert_collaborator(&self, collaborator: &Collaborator) -> StoreResult<()> {
        match self.collaborators().insert_one(collaborator).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(StoreError::DuplicateKey("Collaborator email".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_collaborator(&self, collaborator: &Collaborator) -> StoreResult<bool> {
        match replace_by_id(&self.collaborators(), &collaborator.id, collaborator).await {
            Err(StoreError::Database(e)) if is_duplicate_key(&e) => {
                Err(StoreError::DuplicateKey("Collaborator email".to_string()))
            }
            other => other,
        }
    }

    async fn delete_collaborator(&self, id: &str) -> StoreResult<bool> {
        delete_by_id(&self.collaborators(), id).await
    }

    async fn count_collaborators(&self) -> StoreResult<u64> {
        Ok(self.collaborators().count_documents(doc! {}).await?)
    }

    async fn aggregate(
        &self,
        collection: CollectionName,
        pipeline: &Pipeline,
    ) -> StoreResult<Vec<Document>> {
        let coll = self.db.collection::<Document>(collection.as_str());
        let cursor = coll.aggregate(pipeline.to_documents()).await?;
        Ok(cursor.try_collect().await?)
    }
}

//! In-process document store.
//!
//! Documents are kept as BSON in insertion order, and aggregation pipelines
//! are evaluated here with the same semantics the MongoDB server applies to
//! the rendered stages.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{self, Bson, Document};
use regex::RegexBuilder;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use super::{CollectionName, DocumentStore, FindQuery, StoreError, StoreResult, TextSearch};
use crate::models::{Collaborator, Project};
use crate::pipeline::{Expr, Pipeline, Predicate, Stage};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<CollectionName, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn find_by<T: DeserializeOwned>(
        &self,
        collection: CollectionName,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<T>> {
        let collections = self.collections.read().await;
        let found = collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.get_str(field).ok() == Some(value)));
        match found {
            Some(doc) => Ok(Some(bson::from_document(doc.clone())?)),
            None => Ok(None),
        }
    }

    async fn list<T: DeserializeOwned>(
        &self,
        collection: CollectionName,
        query: &FindQuery,
    ) -> StoreResult<Vec<T>> {
        let collections = self.collections.read().await;
        let docs = collections.get(&collection).map(Vec::as_slice).unwrap_or(&[]);

        let mut rows: Vec<&Document> = match &query.search {
            Some(search) => {
                let matcher = text_matcher(search)?;
                docs.iter().filter(|d| matcher(*d)).collect()
            }
            None => docs.iter().collect(),
        };
        if let Some((field, order)) = &query.sort {
            rows.sort_by(|a, b| order.apply(compare_bson(a.get(field), b.get(field))));
        }

        rows.into_iter()
            .skip(usize::try_from(query.skip).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .map(|d| bson::from_document(d.clone()).map_err(StoreError::from))
            .collect()
    }

    async fn insert<T: Serialize>(&self, collection: CollectionName, value: &T) -> StoreResult<()> {
        let doc = bson::to_document(value)?;
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(doc);
        Ok(())
    }

    async fn replace<T: Serialize>(
        &self,
        collection: CollectionName,
        id: &str,
        value: &T,
    ) -> StoreResult<bool> {
        let doc = bson::to_document(value)?;
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(&collection)
            .is_some_and(|docs| replace_in(docs, id, doc)))
    }

    async fn remove(&self, collection: CollectionName, id: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.get_str("_id").ok() != Some(id));
        Ok(docs.len() != before)
    }

    async fn count(&self, collection: CollectionName) -> u64 {
        let collections = self.collections.read().await;
        collections
            .get(&collection)
            .map_or(0, |docs| docs.len() as u64)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>> {
        self.find_by(CollectionName::Projects, "_id", id).await
    }

    async fn list_projects(&self, query: &FindQuery) -> StoreResult<Vec<Project>> {
        self.list(CollectionName::Projects, query).await
    }

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.insert(CollectionName::Projects, project).await
    }

    async fn save_project(&self, project: &Project) -> StoreResult<bool> {
        self.replace(CollectionName::Projects, &project.id, project).await
    }

    async fn delete_project(&self, id: &str) -> StoreResult<bool> {
        self.remove(CollectionName::Projects, id).await
    }

    async fn count_projects(&self) -> StoreResult<u64> {
        Ok(self.count(CollectionName::Projects).await)
    }

    async fn find_collaborator(&self, id: &str) -> StoreResult<Option<Collaborator>> {
        self.find_by(CollectionName::Collaborators, "_id", id).await
    }

    async fn find_collaborator_by_email(&self, email: &str) -> StoreResult<Option<Collaborator>> {
        self.find_by(CollectionName::Collaborators, "email", email).await
    }

    async fn list_collaborators(&self, query: &FindQuery) -> StoreResult<Vec<Collaborator>> {
        self.list(CollectionName::Collaborators, query).await
    }

    async fn insert_collaborator(&self, collaborator: &Collaborator) -> StoreResult<()> {
        let doc = bson::to_document(collaborator)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(CollectionName::Collaborators).or_default();
        if email_taken(docs, &collaborator.email, &collaborator.id) {
            return Err(duplicate_email());
        }
        docs.push(doc);
        Ok(())
    }

    async fn save_collaborator(&self, collaborator: &Collaborator) -> StoreResult<bool> {
        let doc = bson::to_document(collaborator)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&CollectionName::Collaborators) else {
            return Ok(false);
        };
        if email_taken(docs, &collaborator.email, &collaborator.id) {
            return Err(duplicate_email());
        }
        Ok(replace_in(docs, &collaborator.id, doc))
    }

    async fn delete_collaborator(&self, id: &str) -> StoreResult<bool> {
        self.remove(CollectionName::Collaborators, id).await
    }

    async fn count_collaborators(&self) -> StoreResult<u64> {
        Ok(self.count(CollectionName::Collaborators).await)
    }

    async fn aggregate(
        &self,
        collection: CollectionName,
        pipeline: &Pipeline,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let input = collections.get(&collection).cloned().unwrap_or_default();
        evaluate(pipeline, input, &collections)
    }
}

fn duplicate_email() -> StoreError {
    StoreError::DuplicateKey("Collaborator email".to_string())
}

/// True when a collaborator other than `owner` already uses `email`.
fn email_taken(docs: &[Document], email: &str, owner: &str) -> bool {
    docs.iter().any(|d| {
        d.get_str("email").ok() == Some(email) && d.get_str("_id").ok() != Some(owner)
    })
}

fn replace_in(docs: &mut [Document], id: &str, doc: Document) -> bool {
    match docs.iter_mut().find(|d| d.get_str("_id").ok() == Some(id)) {
        Some(existing) => {
            *existing = doc;
            true
        }
        None => false,
    }
}

fn text_matcher(search: &TextSearch) -> StoreResult<impl Fn(&Document) -> bool + '_> {
    let pattern = RegexBuilder::new(&regex::escape(&search.needle))
        .case_insensitive(true)
        .build()
        .map_err(|e| StoreError::Pipeline(e.to_string()))?;
    Ok(move |doc: &Document| {
        search
            .fields
            .iter()
            .any(|field| doc.get_str(field).is_ok_and(|value| pattern.is_match(value)))
    })
}

/// Runs `pipeline` over `input`. Lookups read from `collections`.
fn evaluate(
    pipeline: &Pipeline,
    input: Vec<Document>,
    collections: &HashMap<CollectionName, Vec<Document>>,
) -> StoreResult<Vec<Document>> {
    let mut rows = input;
    for stage in pipeline.stages() {
        rows = match stage {
            Stage::Match(predicate) => rows.into_iter().filter(|r| satisfies(r, predicate)).collect(),
            Stage::Unwind(path) => rows.into_iter().flat_map(|r| unwind(r, path)).collect(),
            Stage::Project(fields) => rows.iter().map(|r| project(r, fields)).collect(),
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => {
                let foreign = collections.get(from).map(Vec::as_slice).unwrap_or(&[]);
                rows.into_iter()
                    .map(|mut row| {
                        let joined: Vec<Bson> = match get_path(&row, local_field) {
                            Some(local) => foreign
                                .iter()
                                .filter(|d| get_path(d, foreign_field) == Some(local))
                                .cloned()
                                .map(Bson::Document)
                                .collect(),
                            None => Vec::new(),
                        };
                        set_path(&mut row, as_field, Bson::Array(joined));
                        row
                    })
                    .collect()
            }
            Stage::Group { keys, count_field } => group(&rows, keys, count_field),
            Stage::Sort(keys) => {
                let mut sorted = rows;
                sorted.sort_by(|a, b| {
                    keys.iter()
                        .map(|(field, order)| {
                            order.apply(compare_bson(get_path(a, field), get_path(b, field)))
                        })
                        .find(|ordering| *ordering != Ordering::Equal)
                        .unwrap_or(Ordering::Equal)
                });
                sorted
            }
            Stage::Skip(n) => rows
                .into_iter()
                .skip(usize::try_from(*n).map_err(|e| StoreError::Pipeline(e.to_string()))?)
                .collect(),
            Stage::Limit(n) => rows
                .into_iter()
                .take(usize::try_from(*n).map_err(|e| StoreError::Pipeline(e.to_string()))?)
                .collect(),
        };
    }
    Ok(rows)
}

fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                set_path(inner, rest, value);
            } else {
                let mut inner = Document::new();
                set_path(&mut inner, rest, value);
                doc.insert(head, inner);
            }
        }
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn satisfies(row: &Document, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Eq { field, value } => get_path(row, field) == Some(value),
        Predicate::Range { field, min, max } => {
            match get_path(row, field).and_then(as_number) {
                Some(n) => n >= *min as f64 && max.map_or(true, |max| n <= max as f64),
                None => false,
            }
        }
    }
}

fn unwind(row: Document, path: &str) -> Vec<Document> {
    match get_path(&row, path).cloned() {
        Some(Bson::Array(items)) => items
            .into_iter()
            .map(|item| {
                let mut expanded = row.clone();
                set_path(&mut expanded, path, item);
                expanded
            })
            .collect(),
        Some(Bson::Null) | None => Vec::new(),
        Some(_) => vec![row],
    }
}

fn eval_expr(row: &Document, expr: &Expr) -> Option<Bson> {
    match expr {
        Expr::Field(path) => get_path(row, path).cloned(),
        Expr::Size(path) => {
            let len = match get_path(row, path) {
                Some(Bson::Array(items)) => items.len(),
                _ => 0,
            };
            Some(Bson::Int64(i64::try_from(len).unwrap_or(i64::MAX)))
        }
    }
}

fn project(row: &Document, fields: &[(String, Expr)]) -> Document {
    let mut out = Document::new();
    for (name, expr) in fields {
        if let Some(value) = eval_expr(row, expr) {
            out.insert(name.as_str(), value);
        }
    }
    out
}

fn group(rows: &[Document], keys: &[(String, Expr)], count_field: &str) -> Vec<Document> {
    let mut order: Vec<(Document, i64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let mut key = Document::new();
        for (name, expr) in keys {
            key.insert(name.as_str(), eval_expr(row, expr).unwrap_or(Bson::Null));
        }
        let slot = *index.entry(key.to_string()).or_insert_with(|| {
            order.push((key.clone(), 0));
            order.len() - 1
        });
        order[slot].1 += 1;
    }
    order
        .into_iter()
        .map(|(key, count)| {
            let mut out = Document::new();
            out.insert("_id", key);
            out.insert(count_field, count);
            out
        })
        .collect()
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) => 0,
        Some(v) if as_number(v).is_some() => 1,
        Some(Bson::String(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(_) => 5,
    }
}

/// Orders values the way the server does for the types stored here:
/// missing/null, then numbers, then strings.
fn compare_bson(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(Bson::String(x)), Some(Bson::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (as_number(x), as_number(y)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

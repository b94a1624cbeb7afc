// src/statistics.rs
//! Read-only rollups over projects, their tasks and task collaborators.
//!
//! Every ranked query has the same tail: keep rows whose count lies in
//! `[min, max]`, sort by count descending (ties by name ascending), then
//! apply `skip`/`limit`. Nothing is maintained incrementally; each request
//! recomputes from the stored documents.

use actix_web::{web, HttpResponse};
use log::debug;
use mongodb::bson::{self, Document};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::{ApiError, Resource};
use crate::models::parse_id;
use crate::pagination::check_limit;
use crate::pipeline::{Expr, Pipeline, SortOrder};
use crate::project::find_project;
use crate::store::{CollectionName, DocumentStore};

pub const DEFAULT_STATS_LIMIT: u64 = 10;

fn default_stats_limit() -> u64 {
    DEFAULT_STATS_LIMIT
}

/// `?min=&max=&limit=&skip=` shared by the ranked statistics endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub min: u32,
    pub max: Option<u32>,
    #[serde(default = "default_stats_limit")]
    pub limit: u64,
    #[serde(default)]
    pub skip: u64,
}

impl Default for StatsQuery {
    fn default() -> Self {
        Self {
            min: 0,
            max: None,
            limit: DEFAULT_STATS_LIMIT,
            skip: 0,
        }
    }
}

impl StatsQuery {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_limit(self.limit)?;
        if let Some(max) = self.max {
            if max < self.min {
                return Err(ApiError::Validation(format!(
                    "max ({max}) must not be less than min ({})",
                    self.min
                )));
            }
        }
        Ok(())
    }

    /// Appends the shared filter/sort/window tail.
    fn rank(&self, pipeline: Pipeline, count_field: &str, name_field: &str) -> Pipeline {
        pipeline
            .match_range(count_field, i64::from(self.min), self.max.map(i64::from))
            .sort(&[
                (count_field, SortOrder::Descending),
                (name_field, SortOrder::Ascending),
            ])
            .skip(self.skip)
            .limit(self.limit)
    }
}

/// `StatsQuery` fields plus an optional project scope.
#[derive(Debug, Deserialize)]
pub struct CollaboratorsPerTaskQuery {
    pub project_id: Option<String>,
    #[serde(default)]
    pub min: u32,
    pub max: Option<u32>,
    #[serde(default = "default_stats_limit")]
    pub limit: u64,
    #[serde(default)]
    pub skip: u64,
}

impl CollaboratorsPerTaskQuery {
    pub fn stats(&self) -> StatsQuery {
        StatsQuery {
            min: self.min,
            max: self.max,
            limit: self.limit,
            skip: self.skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCount {
    pub total_projects: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksPerProject {
    pub project_id: String,
    pub project_name: String,
    pub total_tasks: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorsPerTask {
    pub project_id: String,
    pub task_id: String,
    pub task_name: String,
    pub total_collaborators: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksPerCollaborator {
    pub collaborator_name: String,
    pub collaborator_email: String,
    pub total_tasks: i64,
}

pub fn tasks_per_project_pipeline(query: &StatsQuery) -> Pipeline {
    let rows = Pipeline::new().project(&[
        ("project_id", Expr::field("_id")),
        ("project_name", Expr::field("name")),
        ("total_tasks", Expr::size("tasks")),
    ]);
    query.rank(rows, "total_tasks", "project_name")
}

pub fn collaborators_per_task_pipeline(query: &StatsQuery, project_id: Option<&str>) -> Pipeline {
    let mut rows = Pipeline::new();
    if let Some(project_id) = project_id {
        rows = rows.match_eq("_id", project_id);
    }
    let rows = rows.unwind("tasks").project(&[
        ("project_id", Expr::field("_id")),
        ("task_id", Expr::field("tasks._id")),
        ("task_name", Expr::field("tasks.name")),
        ("total_collaborators", Expr::size("tasks.collaborators")),
    ]);
    query.rank(rows, "total_collaborators", "task_name")
}

/// Task collaborator ids are joined against the collaborators collection;
/// ids with no matching document vanish at the second unwind of `member`.
pub fn tasks_per_collaborator_pipeline(query: &StatsQuery) -> Pipeline {
    let rows = Pipeline::new()
        .unwind("tasks")
        .unwind("tasks.collaborators")
        .lookup(
            CollectionName::Collaborators,
            "tasks.collaborators",
            "_id",
            "member",
        )
        .unwind("member")
        .group_count(
            &[
                ("name", Expr::field("member.name")),
                ("email", Expr::field("member.email")),
            ],
            "total_tasks",
        )
        .project(&[
            ("collaborator_name", Expr::field("_id.name")),
            ("collaborator_email", Expr::field("_id.email")),
            ("total_tasks", Expr::field("total_tasks")),
        ]);
    query.rank(rows, "total_tasks", "collaborator_email")
}

async fn run<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    pipeline: &Pipeline,
) -> Result<Vec<T>, ApiError> {
    let rows: Vec<Document> = store.aggregate(CollectionName::Projects, pipeline).await?;
    rows.into_iter()
        .map(|row| bson::from_document(row).map_err(|e| ApiError::Store(e.into())))
        .collect()
}

pub async fn total_projects(store: &dyn DocumentStore) -> Result<ProjectCount, ApiError> {
    Ok(ProjectCount {
        total_projects: store.count_projects().await?,
    })
}

pub async fn tasks_per_project(
    store: &dyn DocumentStore,
    query: &StatsQuery,
) -> Result<Vec<TasksPerProject>, ApiError> {
    query.validate()?;
    run(store, &tasks_per_project_pipeline(query)).await
}

/// Scoping to a project that does not exist is NotFound, not an empty list.
pub async fn collaborators_per_task(
    store: &dyn DocumentStore,
    query: &StatsQuery,
    project_id: Option<&str>,
) -> Result<Vec<CollaboratorsPerTask>, ApiError> {
    query.validate()?;
    if let Some(project_id) = project_id {
        find_project(store, project_id).await?;
    }
    run(store, &collaborators_per_task_pipeline(query, project_id)).await
}

pub async fn tasks_per_collaborator(
    store: &dyn DocumentStore,
    query: &StatsQuery,
) -> Result<Vec<TasksPerCollaborator>, ApiError> {
    query.validate()?;
    run(store, &tasks_per_collaborator_pipeline(query)).await
}

/// GET /statistics/projects/count
pub async fn count_projects(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let count = total_projects(data.store()).await?;
    Ok(HttpResponse::Ok().json(count))
}

/// GET /statistics/tasks-per-project
pub async fn get_tasks_per_project(
    data: web::Data<AppState>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    debug!("tasks-per-project {:?}", query);
    let rows = tasks_per_project(data.store(), &query).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// GET /statistics/collaborators-per-task
pub async fn get_collaborators_per_task(
    data: web::Data<AppState>,
    query: web::Query<CollaboratorsPerTaskQuery>,
) -> Result<HttpResponse, ApiError> {
    debug!("collaborators-per-task {:?}", query);
    let query = query.into_inner();
    let project_id = query
        .project_id
        .as_deref()
        .map(|id| parse_id(id, Resource::Project))
        .transpose()?;
    let rows = collaborators_per_task(data.store(), &query.stats(), project_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// GET /statistics/tasks-per-collaborator
pub async fn get_tasks_per_collaborator(
    data: web::Data<AppState>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    debug!("tasks-per-collaborator {:?}", query);
    let rows = tasks_per_collaborator(data.store(), &query).await?;
    Ok(HttpResponse::Ok().json(rows))
}

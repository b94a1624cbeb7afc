// src/task.rs
//! Tasks are addressed by their own id inside the parent project document.
//! Every mutation rewrites the whole project.

use std::cmp::Ordering;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{debug, info};

use crate::app_state::AppState;
use crate::error::{ApiError, Resource};
use crate::models::{parse_id, CreateTaskRequest, Task, UpdateTaskRequest};
use crate::pagination::ListQuery;
use crate::project::{find_project, persist_project};
use crate::store::{DocumentStore, FindQuery};

/// Fields a task listing may be sorted by.
pub const SORTABLE_FIELDS: &[&str] = &["name", "created_at", "updated_at", "status"];

fn compare_tasks(a: &Task, b: &Task, field: &str) -> Ordering {
    match field {
        "name" => a.name.cmp(&b.name),
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        "status" => a.status.as_str().cmp(b.status.as_str()),
        _ => Ordering::Equal,
    }
}

/// Tasks are embedded, so ordering and the skip/limit window are applied
/// here over the project's array. Ties keep their stored order.
pub async fn find_tasks(
    store: &dyn DocumentStore,
    project_id: &str,
    query: &FindQuery,
) -> Result<Vec<Task>, ApiError> {
    let mut tasks = find_project(store, project_id).await?.tasks;
    if let Some((field, order)) = &query.sort {
        tasks.sort_by(|a, b| order.apply(compare_tasks(a, b, field)));
    }
    Ok(tasks
        .into_iter()
        .skip(usize::try_from(query.skip).unwrap_or(usize::MAX))
        .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
        .collect())
}

pub async fn find_task(
    store: &dyn DocumentStore,
    project_id: &str,
    task_id: &str,
) -> Result<Task, ApiError> {
    let project = find_project(store, project_id).await?;
    project.task(task_id).cloned()
}

pub async fn append_task(
    store: &dyn DocumentStore,
    project_id: &str,
    request: CreateTaskRequest,
) -> Result<Task, ApiError> {
    request.validate()?;
    let mut project = find_project(store, project_id).await?;
    let now = Utc::now();
    let task = Task::new(request, now);
    project.tasks.push(task.clone());
    project.touch(now);
    persist_project(store, &project).await?;
    info!("Task {:?} added to project {:?}", task.id, project.id);
    Ok(task)
}

pub async fn patch_task(
    store: &dyn DocumentStore,
    project_id: &str,
    task_id: &str,
    patch: UpdateTaskRequest,
) -> Result<Task, ApiError> {
    patch.validate()?;
    let mut project = find_project(store, project_id).await?;
    let now = Utc::now();
    let task = project.task_mut(task_id)?;
    task.merge(patch, now);
    let task = task.clone();
    project.touch(now);
    persist_project(store, &project).await?;
    info!("Task {:?} updated in project {:?}", task.id, project.id);
    Ok(task)
}

pub async fn remove_task(
    store: &dyn DocumentStore,
    project_id: &str,
    task_id: &str,
) -> Result<(), ApiError> {
    let mut project = find_project(store, project_id).await?;
    project.remove_task(task_id)?;
    project.touch(Utc::now());
    persist_project(store, &project).await?;
    info!("Task {:?} removed from project {:?}", task_id, project.id);
    Ok(())
}

fn task_path(path: web::Path<(String, String)>) -> Result<(String, String), ApiError> {
    let (project_id, task_id) = path.into_inner();
    Ok((
        parse_id(&project_id, Resource::Project)?,
        parse_id(&task_id, Resource::Task)?,
    ))
}

/// GET /projects/{project_id}/tasks?skip=&limit=&sort=
pub async fn list_tasks(
    data: web::Data<AppState>,
    project_id: web::Path<String>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let project_id = parse_id(&project_id, Resource::Project)?;
    let query = query.into_inner().into_find_query(SORTABLE_FIELDS)?;
    let tasks = find_tasks(data.store(), &project_id, &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// GET /projects/{project_id}/tasks/{task_id}
pub async fn get_task(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (project_id, task_id) = task_path(path)?;
    let task = find_task(data.store(), &project_id, &task_id).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// POST /projects/{project_id}/tasks
pub async fn create_task(
    data: web::Data<AppState>,
    project_id: web::Path<String>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let project_id = parse_id(&project_id, Resource::Project)?;
    debug!(
        "Received create_task request for project {} with payload: {:?}",
        project_id, payload
    );
    let task = append_task(data.store(), &project_id, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(task))
}

/// PUT /projects/{project_id}/tasks/{task_id}
pub async fn update_task(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let (project_id, task_id) = task_path(path)?;
    debug!("Received update_task request for {} with payload: {:?}", task_id, payload);
    let task = patch_task(data.store(), &project_id, &task_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// DELETE /projects/{project_id}/tasks/{task_id}
pub async fn delete_task(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (project_id, task_id) = task_path(path)?;
    remove_task(data.store(), &project_id, &task_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{new_id, CreateProjectRequest, Status};
    use crate::project::insert_project;
    use crate::store::MemoryStore;

    async fn project(store: &MemoryStore, tasks: &[&str]) -> String {
        let request = CreateProjectRequest {
            name: "Website Redesign".into(),
            description: String::new(),
            status: Status::default(),
            tasks: tasks
                .iter()
                .map(|name| CreateTaskRequest {
                    name: name.to_string(),
                    description: String::new(),
                    status: Status::default(),
                })
                .collect(),
        };
        insert_project(store, request).await.unwrap().id
    }

    #[actix_web::test]
    async fn created_task_reads_back_with_defaults() {
        let store = MemoryStore::new();
        let project_id = project(&store, &[]).await;
        let request: CreateTaskRequest =
            serde_json::from_str(r#"{"name":"Design","description":"mockups"}"#).unwrap();

        let created = append_task(&store, &project_id, request).await.unwrap();
        let fetched = find_task(&store, &project_id, &created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.status, Status::NotDone);
        assert_eq!(fetched.description, "mockups");
    }

    #[actix_web::test]
    async fn appending_a_task_bumps_the_project_timestamp() {
        let store = MemoryStore::new();
        let project_id = project(&store, &["Design"]).await;
        let before = find_project(&store, &project_id).await.unwrap();

        let task = append_task(
            &store,
            &project_id,
            serde_json::from_str(r#"{"name":"Build"}"#).unwrap(),
        )
        .await
        .unwrap();

        let after = find_project(&store, &project_id).await.unwrap();
        assert_eq!(after.tasks.len(), 2);
        assert_eq!(after.updated_at, task.updated_at);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[actix_web::test]
    async fn removing_a_task_bumps_the_project_timestamp() {
        let store = MemoryStore::new();
        let project_id = project(&store, &["a", "b"]).await;
        let mut before = find_project(&store, &project_id).await.unwrap();
        before.updated_at = "2024-05-01T12:00:00Z".parse().unwrap();
        store.save_project(&before).await.unwrap();

        remove_task(&store, &project_id, &before.tasks[0].id).await.unwrap();

        let after = find_project(&store, &project_id).await.unwrap();
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.tasks[0].updated_at, before.tasks[1].updated_at);
    }

    #[actix_web::test]
    async fn listing_sorts_then_windows_the_embedded_tasks() {
        let store = MemoryStore::new();
        let project_id = project(&store, &["a", "b", "c"]).await;

        let query = ListQuery {
            skip: 1,
            limit: 1,
            sort: Some("-name".into()),
        }
        .into_find_query(SORTABLE_FIELDS)
        .unwrap();
        let names: Vec<String> = find_tasks(&store, &project_id, &query)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["b"]);

        let unsorted = find_tasks(&store, &project_id, &FindQuery::default())
            .await
            .unwrap();
        let names: Vec<&str> = unsorted.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let unknown_field = ListQuery {
            skip: 0,
            limit: 5,
            sort: Some("collaborators".into()),
        }
        .into_find_query(SORTABLE_FIELDS);
        assert!(matches!(unknown_field, Err(ApiError::Validation(_))));
    }

    #[actix_web::test]
    async fn task_mutations_bump_the_project_timestamp() {
        let store = MemoryStore::new();
        let project_id = project(&store, &["Design"]).await;
        let before = find_project(&store, &project_id).await.unwrap();
        let task_id = before.tasks[0].id.clone();

        let task = patch_task(
            &store,
            &project_id,
            &task_id,
            UpdateTaskRequest {
                status: Some(Status::Done),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let after = find_project(&store, &project_id).await.unwrap();
        assert_eq!(task.status, Status::Done);
        assert_eq!(after.tasks[0], task);
        assert_eq!(after.updated_at, task.updated_at);
        assert!(after.updated_at >= before.updated_at);
    }

    #[actix_web::test]
    async fn deleting_a_task_shifts_the_rest_down() {
        let store = MemoryStore::new();
        let project_id = project(&store, &["a", "b", "c"]).await;
        let tasks = find_tasks(&store, &project_id, &FindQuery::default()).await.unwrap();

        remove_task(&store, &project_id, &tasks[1].id).await.unwrap();

        let remaining = find_tasks(&store, &project_id, &FindQuery::default()).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[1].id, tasks[2].id);
        assert!(matches!(
            find_task(&store, &project_id, &tasks[1].id).await,
            Err(ApiError::NotFound(Resource::Task))
        ));
    }

    #[actix_web::test]
    async fn not_found_reports_the_first_missing_level() {
        let store = MemoryStore::new();
        let project_id = project(&store, &[]).await;

        assert!(matches!(
            find_task(&store, &new_id(), &new_id()).await,
            Err(ApiError::NotFound(Resource::Project))
        ));
        assert!(matches!(
            patch_task(&store, &project_id, &new_id(), UpdateTaskRequest::default()).await,
            Err(ApiError::NotFound(Resource::Task))
        ));
        assert!(matches!(
            remove_task(&store, &project_id, &new_id()).await,
            Err(ApiError::NotFound(Resource::Task))
        ));
    }
}

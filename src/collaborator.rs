// src/collaborator.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{debug, info, warn};

use crate::app_state::AppState;
use crate::error::{ApiError, Resource};
use crate::models::{
    parse_id, Collaborator, CreateCollaboratorRequest, Task, UpdateCollaboratorRequest,
};
use crate::pagination::{ListQuery, SearchQuery};
use crate::project::{find_project, persist_project};
use crate::store::{DocumentStore, FindQuery};

pub const SORTABLE_FIELDS: &[&str] = &["name", "email", "function"];
const SEARCH_FIELDS: &[&str] = &["email", "name"];

fn duplicate_email(email: &str) -> ApiError {
    warn!("Rejected duplicate collaborator email {}", email);
    ApiError::Conflict(format!("Email {email} is already registered"))
}

pub async fn find_collaborators(
    store: &dyn DocumentStore,
    query: &FindQuery,
) -> Result<Vec<Collaborator>, ApiError> {
    Ok(store.list_collaborators(query).await?)
}

pub async fn find_collaborator(
    store: &dyn DocumentStore,
    collaborator_id: &str,
) -> Result<Collaborator, ApiError> {
    store
        .find_collaborator(collaborator_id)
        .await?
        .ok_or(ApiError::NotFound(Resource::Collaborator))
}

pub async fn insert_collaborator(
    store: &dyn DocumentStore,
    request: CreateCollaboratorRequest,
) -> Result<Collaborator, ApiError> {
    request.validate()?;
    let collaborator = Collaborator::new(request);
    if store
        .find_collaborator_by_email(&collaborator.email)
        .await?
        .is_some()
    {
        return Err(duplicate_email(&collaborator.email));
    }
    store.insert_collaborator(&collaborator).await?;
    info!("Collaborator created {:?}", collaborator.id);
    Ok(collaborator)
}

pub async fn patch_collaborator(
    store: &dyn DocumentStore,
    collaborator_id: &str,
    patch: UpdateCollaboratorRequest,
) -> Result<Collaborator, ApiError> {
    patch.validate()?;
    let mut collaborator = find_collaborator(store, collaborator_id).await?;
    if let Some(email) = patch.normalized_email() {
        if let Some(owner) = store.find_collaborator_by_email(&email).await? {
            if owner.id != collaborator.id {
                return Err(duplicate_email(&email));
            }
        }
    }
    collaborator.merge(patch);
    if !store.save_collaborator(&collaborator).await? {
        return Err(ApiError::NotFound(Resource::Collaborator));
    }
    info!("Collaborator updated {:?}", collaborator.id);
    Ok(collaborator)
}

/// Deletes the collaborator document. Task references to it are left in
/// place and ignored by the statistics join.
pub async fn remove_collaborator(
    store: &dyn DocumentStore,
    collaborator_id: &str,
) -> Result<(), ApiError> {
    if !store.delete_collaborator(collaborator_id).await? {
        return Err(ApiError::NotFound(Resource::Collaborator));
    }
    info!("Collaborator deleted {:?}", collaborator_id);
    Ok(())
}

/// Appends a collaborator to a task. Lookups run project, task, then
/// collaborator, and the first missing one is reported.
pub async fn attach(
    store: &dyn DocumentStore,
    project_id: &str,
    task_id: &str,
    collaborator_id: &str,
) -> Result<Task, ApiError> {
    let mut project = find_project(store, project_id).await?;
    project.task(task_id)?;
    let collaborator = find_collaborator(store, collaborator_id).await?;

    let now = Utc::now();
    let task = project.task_mut(task_id)?;
    if task.has_collaborator(&collaborator.id) {
        warn!(
            "Collaborator {} already attached to task {}",
            collaborator.id, task.id
        );
        return Err(ApiError::Conflict(format!(
            "Collaborator {} is already attached to this task",
            collaborator.email
        )));
    }
    task.collaborators.push(collaborator.id.clone());
    task.updated_at = now;
    let task = task.clone();
    project.touch(now);
    persist_project(store, &project).await?;
    info!("Collaborator {:?} attached to task {:?}", collaborator.id, task.id);
    Ok(task)
}

/// Removes a collaborator reference from a task. The collaborator document
/// may already be gone, so only the reference itself is checked.
pub async fn detach(
    store: &dyn DocumentStore,
    project_id: &str,
    task_id: &str,
    collaborator_id: &str,
) -> Result<Task, ApiError> {
    let mut project = find_project(store, project_id).await?;
    let now = Utc::now();
    let task = project.task_mut(task_id)?;
    if !task.has_collaborator(collaborator_id) {
        return Err(ApiError::NotFound(Resource::Collaborator));
    }
    task.collaborators.retain(|id| id != collaborator_id);
    task.updated_at = now;
    let task = task.clone();
    project.touch(now);
    persist_project(store, &project).await?;
    info!("Collaborator {:?} detached from task {:?}", collaborator_id, task.id);
    Ok(task)
}

/// GET /collaborators
pub async fn list_collaborators(
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner().into_find_query(SORTABLE_FIELDS)?;
    let collaborators = find_collaborators(data.store(), &query).await?;
    Ok(HttpResponse::Ok().json(collaborators))
}

/// GET /collaborators/search?query=...
/// Case-insensitive substring match on email or name.
pub async fn search_collaborators(
    data: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner().into_find_query(SEARCH_FIELDS)?;
    let collaborators = find_collaborators(data.store(), &query).await?;
    Ok(HttpResponse::Ok().json(collaborators))
}

/// GET /collaborators/{collaborator_id}
pub async fn get_collaborator(
    data: web::Data<AppState>,
    collaborator_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collaborator_id = parse_id(&collaborator_id, Resource::Collaborator)?;
    let collaborator = find_collaborator(data.store(), &collaborator_id).await?;
    Ok(HttpResponse::Ok().json(collaborator))
}

/// POST /collaborators
pub async fn create_collaborator(
    data: web::Data<AppState>,
    payload: web::Json<CreateCollaboratorRequest>,
) -> Result<HttpResponse, ApiError> {
    debug!("Received create_collaborator request with payload: {:?}", payload);
    let collaborator = insert_collaborator(data.store(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(collaborator))
}

/// PUT /collaborators/{collaborator_id}
pub async fn update_collaborator(
    data: web::Data<AppState>,
    collaborator_id: web::Path<String>,
    payload: web::Json<UpdateCollaboratorRequest>,
) -> Result<HttpResponse, ApiError> {
    let collaborator_id = parse_id(&collaborator_id, Resource::Collaborator)?;
    let collaborator =
        patch_collaborator(data.store(), &collaborator_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(collaborator))
}

/// DELETE /collaborators/{collaborator_id}
pub async fn delete_collaborator(
    data: web::Data<AppState>,
    collaborator_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let collaborator_id = parse_id(&collaborator_id, Resource::Collaborator)?;
    remove_collaborator(data.store(), &collaborator_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

fn attachment_path(
    path: web::Path<(String, String, String)>,
) -> Result<(String, String, String), ApiError> {
    let (collaborator_id, project_id, task_id) = path.into_inner();
    Ok((
        parse_id(&collaborator_id, Resource::Collaborator)?,
        parse_id(&project_id, Resource::Project)?,
        parse_id(&task_id, Resource::Task)?,
    ))
}

/// POST /collaborators/{collaborator_id}/projects/{project_id}/tasks/{task_id}
pub async fn attach_collaborator(
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (collaborator_id, project_id, task_id) = attachment_path(path)?;
    let task = attach(data.store(), &project_id, &task_id, &collaborator_id).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// DELETE /collaborators/{collaborator_id}/projects/{project_id}/tasks/{task_id}
pub async fn detach_collaborator(
    data: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (collaborator_id, project_id, task_id) = attachment_path(path)?;
    let task = detach(data.store(), &project_id, &task_id, &collaborator_id).await?;
    Ok(HttpResponse::Ok().json(task))
}

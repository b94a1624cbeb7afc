// src/project.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{debug, info};

use crate::app_state::AppState;
use crate::error::{ApiError, Resource};
use crate::models::{parse_id, CreateProjectRequest, Project, UpdateProjectRequest};
use crate::pagination::{ListQuery, SearchQuery};
use crate::store::{DocumentStore, FindQuery};

/// Fields a project listing may be sorted by.
pub const SORTABLE_FIELDS: &[&str] = &["name", "created_at", "updated_at", "status"];

pub async fn find_projects(
    store: &dyn DocumentStore,
    query: &FindQuery,
) -> Result<Vec<Project>, ApiError> {
    Ok(store.list_projects(query).await?)
}

pub async fn find_project(store: &dyn DocumentStore, project_id: &str) -> Result<Project, ApiError> {
    store
        .find_project(project_id)
        .await?
        .ok_or(ApiError::NotFound(Resource::Project))
}

pub async fn insert_project(
    store: &dyn DocumentStore,
    request: CreateProjectRequest,
) -> Result<Project, ApiError> {
    request.validate()?;
    let project = Project::new(request, Utc::now());
    store.insert_project(&project).await?;
    info!("Project created {:?}", project.id);
    Ok(project)
}

pub async fn patch_project(
    store: &dyn DocumentStore,
    project_id: &str,
    patch: UpdateProjectRequest,
) -> Result<Project, ApiError> {
    patch.validate()?;
    let mut project = find_project(store, project_id).await?;
    project.merge(patch, Utc::now());
    persist_project(store, &project).await?;
    info!("Project updated {:?}", project.id);
    Ok(project)
}

/// Writes back a whole project document after a read-modify-write.
pub async fn persist_project(store: &dyn DocumentStore, project: &Project) -> Result<(), ApiError> {
    if !store.save_project(project).await? {
        return Err(ApiError::NotFound(Resource::Project));
    }
    Ok(())
}

pub async fn remove_project(store: &dyn DocumentStore, project_id: &str) -> Result<(), ApiError> {
    if !store.delete_project(project_id).await? {
        return Err(ApiError::NotFound(Resource::Project));
    }
    info!("Project deleted {:?}", project_id);
    Ok(())
}

/// GET /projects
pub async fn list_projects(
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner().into_find_query(SORTABLE_FIELDS)?;
    let projects = find_projects(data.store(), &query).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// GET /projects/search?name=...
/// Case-insensitive substring match on the project name.
pub async fn search_projects(
    data: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner().into_find_query(&["name"])?;
    let projects = find_projects(data.store(), &query).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// GET /projects/{project_id}
pub async fn get_project(
    data: web::Data<AppState>,
    project_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = parse_id(&project_id, Resource::Project)?;
    let project = find_project(data.store(), &project_id).await?;
    Ok(HttpResponse::Ok().json(project))
}

/// POST /projects
pub async fn create_project(
    data: web::Data<AppState>,
    payload: web::Json<CreateProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    debug!("Received create_project request with payload: {:?}", payload);
    let project = insert_project(data.store(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(project))
}

/// PUT /projects/{project_id}
/// Applies only the fields present in the payload.
pub async fn update_project(
    data: web::Data<AppState>,
    project_id: web::Path<String>,
    payload: web::Json<UpdateProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    let project_id = parse_id(&project_id, Resource::Project)?;
    debug!(
        "Received update_project request for {} with payload: {:?}",
        project_id, payload
    );
    let project = patch_project(data.store(), &project_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(project))
}

/// DELETE /projects/{project_id}
pub async fn delete_project(
    data: web::Data<AppState>,
    project_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let project_id = parse_id(&project_id, Resource::Project)?;
    remove_project(data.store(), &project_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

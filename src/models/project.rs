use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, require_text, CreateTaskRequest, Status, Task};
use crate::error::{ApiError, Resource};

/// Root aggregate. Tasks live inside the project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "super::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    /// Tasks to seed the project with.
    #[serde(default)]
    pub tasks: Vec<CreateTaskRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
}

impl CreateProjectRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_text("Project name", &self.name)?;
        self.tasks.iter().try_for_each(CreateTaskRequest::validate)
    }
}

impl UpdateProjectRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        match &self.name {
            Some(name) => require_text("Project name", name),
            None => Ok(()),
        }
    }
}

impl Project {
    pub fn new(request: CreateProjectRequest, now: DateTime<Utc>) -> Self {
        Project {
            id: new_id(),
            name: request.name.trim().to_string(),
            description: request.description,
            created_at: now,
            updated_at: now,
            status: request.status,
            tasks: request
                .tasks
                .into_iter()
                .map(|task| Task::new(task, now))
                .collect(),
        }
    }

    /// Applies the fields present in `patch` and bumps `updated_at`.
    pub fn merge(&mut self, patch: UpdateProjectRequest, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }

    pub fn task(&self, task_id: &str) -> Result<&Task, ApiError> {
        self.tasks
            .iter()
            .find(|task| task.id == task_id)
            .ok_or(ApiError::NotFound(Resource::Task))
    }

    pub fn task_mut(&mut self, task_id: &str) -> Result<&mut Task, ApiError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or(ApiError::NotFound(Resource::Task))
    }

    /// Removes a task; later tasks shift down one position.
    pub fn remove_task(&mut self, task_id: &str) -> Result<Task, ApiError> {
        let position = self
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .ok_or(ApiError::NotFound(Resource::Task))?;
        Ok(self.tasks.remove(position))
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

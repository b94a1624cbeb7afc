use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, require_text, Status};
use crate::error::ApiError;

/// A task embedded in a project's `tasks` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
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
    /// Ids of attached collaborators, in attachment order.
    #[serde(default)]
    pub collaborators: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
}

impl CreateTaskRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_text("Task name", &self.name)
    }
}

impl UpdateTaskRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        match &self.name {
            Some(name) => require_text("Task name", name),
            None => Ok(()),
        }
    }
}

impl Task {
    pub fn new(request: CreateTaskRequest, now: DateTime<Utc>) -> Self {
        Task {
            id: new_id(),
            name: request.name.trim().to_string(),
            description: request.description,
            created_at: now,
            updated_at: now,
            status: request.status,
            collaborators: Vec::new(),
        }
    }

    /// Applies the fields present in `patch` and bumps `updated_at`.
    pub fn merge(&mut self, patch: UpdateTaskRequest, now: DateTime<Utc>) {
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

    pub fn has_collaborator(&self, collaborator_id: &str) -> bool {
        self.collaborators.iter().any(|id| id == collaborator_id)
    }
}

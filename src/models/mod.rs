mod collaborator;
mod project;
mod task;
mod timestamp;

pub use collaborator::{Collaborator, CreateCollaboratorRequest, UpdateCollaboratorRequest};
pub use project::{CreateProjectRequest, Project, UpdateProjectRequest};
pub use task::{CreateTaskRequest, Task, UpdateTaskRequest};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, Resource};

/// Progress of a project or task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "Not done")]
    NotDone,
    Doing,
    Done,
}

impl Status {
    /// Name used on the wire and in stored documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::NotDone => "Not done",
            Status::Doing => "Doing",
            Status::Done => "Done",
        }
    }
}

/// Generates a document id. Ids are UUID v4 strings stored under `_id`.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validates an id taken from a request path.
pub fn parse_id(raw: &str, resource: Resource) -> Result<String, ApiError> {
    Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| ApiError::Validation(format!("Invalid {} id: {}", resource.to_string().to_lowercase(), raw)))
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

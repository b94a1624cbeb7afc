use serde::{Deserialize, Serialize};

use super::{new_id, require_text};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Unique across collaborators; stored trimmed and lower-cased.
    pub email: String,
    #[serde(default)]
    pub function: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCollaboratorRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub function: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCollaboratorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub function: Option<String>,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    require_text("Email", email)?;
    if !email.contains('@') {
        return Err(ApiError::Validation(format!("Invalid email: {email}")));
    }
    Ok(())
}

impl CreateCollaboratorRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_text("Collaborator name", &self.name)?;
        validate_email(&self.email)
    }
}

impl UpdateCollaboratorRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            require_text("Collaborator name", name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }

    /// The email this patch would set, normalized.
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().map(normalize_email)
    }
}

impl Collaborator {
    pub fn new(request: CreateCollaboratorRequest) -> Self {
        Collaborator {
            id: new_id(),
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            function: request.function,
        }
    }

    pub fn merge(&mut self, patch: UpdateCollaboratorRequest) {
        if let Some(email) = patch.normalized_email() {
            self.email = email;
        }
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(function) = patch.function {
            self.function = function;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Collaborator {
        Collaborator::new(CreateCollaboratorRequest {
            name: "Alice".into(),
            email: "  Alice@Example.COM ".into(),
            function: "Designer".into(),
        })
    }

    #[test]
    fn email_is_normalized_on_create() {
        assert_eq!(alice().email, "alice@example.com");
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let mut collaborator = alice();
        collaborator.merge(UpdateCollaboratorRequest {
            function: Some("Lead".into()),
            ..Default::default()
        });
        assert_eq!(collaborator.name, "Alice");
        assert_eq!(collaborator.email, "alice@example.com");
        assert_eq!(collaborator.function, "Lead");
    }

    #[test]
    fn rejects_malformed_email() {
        let request = CreateCollaboratorRequest {
            name: "Bob".into(),
            email: "bob.example.com".into(),
            function: String::new(),
        };
        assert!(matches!(request.validate(), Err(ApiError::Validation(_))));

        let patch = UpdateCollaboratorRequest {
            email: Some(" ".into()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }
}

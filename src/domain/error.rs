use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{entity} named `{name}` already exists")]
    Conflict { entity: &'static str, name: String },
    #[error("invalid catalog data: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// A unique name (category or brand) is already taken.
    pub fn conflict(entity: &'static str, name: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            name: name.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

use crate::deploy::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Dacpac file '{}' does not exist. Build the project first.", .path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("Failed to load package '{}': {cause}", .path.display())]
    Load { path: PathBuf, cause: String },

    #[error("Deployment to {database} failed ({kind}): {cause}")]
    Deployment {
        database: String,
        kind: FailureKind,
        cause: String,
    },

    #[error("Deployment to {database} was cancelled")]
    Cancelled { database: String },

    #[error("Connection for {resource} is not available: {cause}")]
    ConnectionUnavailable { resource: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    pub fn configuration(message: impl Into<String>) -> Self {
        DeployError::Configuration {
            message: message.into(),
        }
    }

    pub fn load(path: impl Into<PathBuf>, cause: impl Into<String>) -> Self {
        DeployError::Load {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// Stable code used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            DeployError::Configuration { .. } => "configuration_error",
            DeployError::ArtifactNotFound { .. } => "artifact_not_found",
            DeployError::Load { .. } => "load_failed",
            DeployError::Deployment { .. } => "deployment_failed",
            DeployError::Cancelled { .. } => "cancelled",
            DeployError::ConnectionUnavailable { .. } => "connection_unavailable",
            DeployError::Internal(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for DeployError {
    fn from(err: std::io::Error) -> Self {
        DeployError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        DeployError::Internal(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_not_found_names_path() {
        let err = DeployError::ArtifactNotFound {
            path: PathBuf::from("/src/Catalog/bin/Debug/netstandard2.0/Catalog.dacpac"),
        };
        assert_eq!(
            err.to_string(),
            "Dacpac file '/src/Catalog/bin/Debug/netstandard2.0/Catalog.dacpac' does not exist. Build the project first."
        );
        assert_eq!(err.code(), "artifact_not_found");
    }

    #[test]
    fn test_deployment_error_keeps_cause_verbatim() {
        let err = DeployError::Deployment {
            database: "catalogdb".to_string(),
            kind: FailureKind::SchemaConflict,
            cause: "relation \"products\" already exists".to_string(),
        };
        assert!(err
            .to_string()
            .ends_with("relation \"products\" already exists"));
    }
}

//! Artifact Locator
//!
//! Maps a project definition file to the package its build produces:
//!
//! ```text
//! {project_dir}/bin/{configuration}/{target_framework}/{project_name}.dacpac
//! ```

use crate::error::{DeployError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of built schema packages
pub const ARTIFACT_EXTENSION: &str = "dacpac";

const DEFAULT_CONFIGURATION: &str = "Debug";
const DEFAULT_TARGET_FRAMEWORK: &str = "netstandard2.0";

/// A project resolved to its build output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub project_path: PathBuf,
    pub project_directory: PathBuf,
    pub project_name: String,
    pub artifact_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    configuration: String,
    target_framework: String,
}

impl ArtifactLocator {
    pub fn new(configuration: impl Into<String>, target_framework: impl Into<String>) -> Self {
        Self {
            configuration: configuration.into(),
            target_framework: target_framework.into(),
        }
    }

    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    pub fn target_framework(&self) -> &str {
        &self.target_framework
    }

    /// Compute where the package for `project_path` should be, without
    /// touching the filesystem
    pub fn expected_path(&self, project_path: &Path) -> Result<ArtifactReference> {
        if project_path.as_os_str().is_empty() {
            return Err(DeployError::configuration("Project path is not set."));
        }

        let project_directory = project_path.parent().ok_or_else(|| {
            DeployError::configuration(format!(
                "Project path '{}' does not have a directory.",
                project_path.display()
            ))
        })?;

        let project_name = project_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                DeployError::configuration(format!(
                    "Project path '{}' does not name a project file.",
                    project_path.display()
                ))
            })?;

        let artifact_path = project_directory
            .join("bin")
            .join(&self.configuration)
            .join(&self.target_framework)
            .join(format!("{}.{}", project_name, ARTIFACT_EXTENSION));

        Ok(ArtifactReference {
            project_path: project_path.to_path_buf(),
            project_directory: project_directory.to_path_buf(),
            project_name: project_name.to_string(),
            artifact_path,
        })
    }

    /// Resolve a project to an existing package on disk
    pub fn resolve(&self, project_path: Option<&Path>) -> Result<ArtifactReference> {
        let project_path =
            project_path.ok_or_else(|| DeployError::configuration("Project path is not set."))?;

        let reference = self.expected_path(project_path)?;

        if !reference.artifact_path.is_file() {
            return Err(DeployError::ArtifactNotFound {
                path: reference.artifact_path,
            });
        }

        debug!(
            "Resolved project {:?} to package {:?}",
            reference.project_path, reference.artifact_path
        );

        Ok(reference)
    }
}

impl Default for ArtifactLocator {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIGURATION, DEFAULT_TARGET_FRAMEWORK)
    }
}

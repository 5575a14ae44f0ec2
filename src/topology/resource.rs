use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    Server {
        #[serde(default)]
        connection_string: Option<String>,
    },
    Database {
        server: String,
        /// Name of the database on the server; defaults to the resource name
        #[serde(default)]
        database_name: Option<String>,
    },
    Project {
        #[serde(default)]
        project_path: Option<PathBuf>,
    },
    Container {
        image: String,
    },
}

/// Link from a database resource to the project whose package it receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    DatabaseProject(ResourceLink),
    Environment { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Resource {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            annotations: Vec::new(),
        }
    }

    pub fn annotate(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Database view of this resource, if it is database-kind
    pub fn as_database(&self) -> Option<DatabaseResource<'_>> {
        match &self.kind {
            ResourceKind::Database {
                server,
                database_name,
            } => Some(DatabaseResource {
                resource: self,
                server,
                database_name: database_name.as_deref(),
            }),
            _ => None,
        }
    }
}

/// A database-kind resource
#[derive(Debug, Clone, Copy)]
pub struct DatabaseResource<'a> {
    resource: &'a Resource,
    server: &'a str,
    database_name: Option<&'a str>,
}

impl<'a> DatabaseResource<'a> {
    pub fn name(&self) -> &'a str {
        &self.resource.name
    }

    pub fn server(&self) -> &'a str {
        self.server
    }

    /// Database name on the server
    pub fn target_database(&self) -> &'a str {
        self.database_name.unwrap_or(&self.resource.name)
    }

    pub fn project_links(&self) -> impl Iterator<Item = &'a ResourceLink> + 'a {
        self.resource.annotations.iter().filter_map(|a| match a {
            Annotation::DatabaseProject(link) => Some(link),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    resources: Vec<Resource>,
}

impl Topology {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let topology: Topology = serde_json::from_str(json)
            .map_err(|e| DeployError::configuration(format!("Invalid topology manifest: {}", e)))?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            DeployError::configuration(format!(
                "Failed to read topology manifest {:?}: {}",
                path, e
            ))
        })?;

        let topology = Self::from_json(&json)?;
        debug!(
            "Loaded topology {:?} with {} resources",
            path,
            topology.resources.len()
        );
        Ok(topology)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Database-kind resources in snapshot order
    pub fn databases(&self) -> impl Iterator<Item = DatabaseResource<'_>> {
        self.resources.iter().filter_map(Resource::as_database)
    }

    /// Project path declared by the project resource `name`
    pub fn project_path(&self, name: &str) -> Result<Option<&Path>> {
        match self.get(name).map(|r| &r.kind) {
            Some(ResourceKind::Project { project_path }) => Ok(project_path.as_deref()),
            Some(_) => Err(DeployError::configuration(format!(
                "Resource '{}' is not a project",
                name
            ))),
            None => Err(DeployError::configuration(format!(
                "Project resource '{}' is not declared",
                name
            ))),
        }
    }

    /// Check names are unique and every reference points at a resource of the right kind
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for resource in &self.resources {
            if resource.name.trim().is_empty() {
                return Err(DeployError::configuration("Resource name is empty"));
            }
            if !names.insert(resource.name.as_str()) {
                return Err(DeployError::configuration(format!(
                    "Resource '{}' is declared more than once",
                    resource.name
                )));
            }
        }

        for database in self.databases() {
            match self.get(database.server()).map(|r| &r.kind) {
                Some(ResourceKind::Server { .. }) => {}
                _ => {
                    return Err(DeployError::configuration(format!(
                        "Database '{}' refers to unknown server '{}'",
                        database.name(),
                        database.server()
                    )))
                }
            }

            for link in database.project_links() {
                self.project_path(&link.project).map_err(|e| {
                    DeployError::configuration(format!(
                        "Database '{}' has an invalid project link: {}",
                        database.name(),
                        e
                    ))
                })?;
            }
        }

        Ok(())
    }
}

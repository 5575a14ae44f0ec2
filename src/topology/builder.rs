use super::resource::{Annotation, Resource, ResourceKind, ResourceLink, Topology};
use crate::error::{DeployError, Result};
use std::path::PathBuf;

/// Declares resources and links in code; errors surface from [`build`](Self::build)
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    resources: Vec<Resource>,
    errors: Vec<String>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_server(mut self, name: &str, connection_string: Option<&str>) -> Self {
        self.resources.push(Resource::new(
            name,
            ResourceKind::Server {
                connection_string: connection_string.map(str::to_string),
            },
        ));
        self
    }

    pub fn add_database(mut self, name: &str, server: &str) -> Self {
        self.resources.push(Resource::new(
            name,
            ResourceKind::Database {
                server: server.to_string(),
                database_name: None,
            },
        ));
        self
    }

    pub fn add_named_database(mut self, name: &str, server: &str, database_name: &str) -> Self {
        self.resources.push(Resource::new(
            name,
            ResourceKind::Database {
                server: server.to_string(),
                database_name: Some(database_name.to_string()),
            },
        ));
        self
    }

    pub fn add_project(mut self, name: &str, project_path: impl Into<PathBuf>) -> Self {
        self.resources.push(Resource::new(
            name,
            ResourceKind::Project {
                project_path: Some(project_path.into()),
            },
        ));
        self
    }

    pub fn add_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Link `database` to `project`, replacing any link it already has
    pub fn with_database_project(mut self, database: &str, project: &str) -> Self {
        if let Some(resource) = self.database_mut(database) {
            resource
                .annotations
                .retain(|a| !matches!(a, Annotation::DatabaseProject(_)));
            resource.annotate(Annotation::DatabaseProject(ResourceLink {
                project: project.to_string(),
            }));
        }
        self
    }

    /// Add a further project link to `database`, keeping existing ones
    pub fn add_database_project(mut self, database: &str, project: &str) -> Self {
        if let Some(resource) = self.database_mut(database) {
            resource.annotate(Annotation::DatabaseProject(ResourceLink {
                project: project.to_string(),
            }));
        }
        self
    }

    pub fn build(self) -> Result<Topology> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(DeployError::configuration(error));
        }

        let topology = Topology::new(self.resources);
        topology.validate()?;
        Ok(topology)
    }

    fn database_mut(&mut self, name: &str) -> Option<&mut Resource> {
        let found = self
            .resources
            .iter_mut()
            .find(|r| r.name == name && matches!(r.kind, ResourceKind::Database { .. }));

        if found.is_none() {
            self.errors
                .push(format!("Database resource '{}' is not declared", name));
        }

        found
    }
}

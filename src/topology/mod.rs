//! Topology snapshot
//!
//! Read-only view of the resources declared for an application run. Database
//! resources may carry project links; those links drive package deployment.
//!
//! Manifest format:
//! ```json
//! {
//!   "resources": [
//!     { "name": "sql", "kind": { "type": "server", "connection_string": "postgres://..." } },
//!     { "name": "catalogdb", "kind": { "type": "database", "server": "sql" },
//!       "annotations": [ { "type": "database_project", "project": "catalog" } ] },
//!     { "name": "catalog", "kind": { "type": "project", "project_path": "/src/Catalog/Catalog.sqlproj" } }
//!   ]
//! }
//! ```

mod builder;
mod connection;
mod resource;

pub use builder::TopologyBuilder;
pub use connection::{ConnectionDescriptor, ConnectionResolver, ServerConnectionResolver};
pub use resource::{Annotation, DatabaseResource, Resource, ResourceKind, ResourceLink, Topology};

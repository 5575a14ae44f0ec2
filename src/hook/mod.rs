//! Lifecycle hooks
//!
//! The host fires "after resources created" once per application run; every
//! registered [`LifecycleHook`] then runs in registration order.

mod deploy_projects;
mod registry;

pub use deploy_projects::{DeployDatabaseProjectsHook, DeployedProject, DeploymentReport};
pub use registry::{HookRegistry, LifecycleContext, LifecycleHook};

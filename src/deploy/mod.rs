//! Deployment of loaded packages onto a database endpoint
//!
//! [`DeploymentService`] is bound to one connection and drives a
//! [`DeploymentEngine`]; diagnostic messages produced during a deploy are
//! delivered in order to the service's subscribers before `deploy` returns.

mod engine;
mod message;
mod postgres;
mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{DeployOptions, DeployRequest, DeploymentEngine, EngineFailure, FailureKind};
pub use message::{DiagnosticMessage, MessageChannel, MessageKind};
pub use postgres::PostgresEngine;
pub use service::DeploymentService;
pub use tokio_util::sync::CancellationToken;

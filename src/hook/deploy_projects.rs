//! Deploy linked database projects once all resources exist
//!
//! For every database resource, in snapshot order:
//! 1. resolve its live connection
//! 2. for each project link: locate the built package, load it, deploy it
//!
//! Deployments are sequential. The first failure ends the run.

use super::registry::{LifecycleContext, LifecycleHook};
use crate::artifact::ArtifactLocator;
use crate::deploy::{DeployOptions, DeploymentEngine, DeploymentService, DiagnosticMessage, MessageKind};
use crate::error::Result;
use crate::package::PackageLoader;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Target databases are disposable development/test instances
const ALLOW_DATA_LOSS: bool = true;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedProject {
    pub database: String,
    pub project: String,
    pub artifact_path: PathBuf,
    pub checksum: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    pub deployed: Vec<DeployedProject>,
    pub databases_visited: usize,
    pub execution_time_ms: u64,
}

type MessageSink = Arc<dyn Fn(&DiagnosticMessage) + Send + Sync>;

pub struct DeployDatabaseProjectsHook {
    locator: ArtifactLocator,
    loader: PackageLoader,
    engine: Arc<dyn DeploymentEngine>,
    options: DeployOptions,
    sink: MessageSink,
}

impl DeployDatabaseProjectsHook {
    pub const NAME: &'static str = "deploy-database-projects";

    pub fn new(engine: Arc<dyn DeploymentEngine>) -> Self {
        Self {
            locator: ArtifactLocator::default(),
            loader: PackageLoader::new(),
            engine,
            options: DeployOptions::default(),
            sink: Arc::new(log_message),
        }
    }

    pub fn with_locator(mut self, locator: ArtifactLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    /// Where deployment diagnostics go; the default writes them to the log
    pub fn with_message_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&DiagnosticMessage) + Send + Sync + 'static,
    {
        self.sink = Arc::new(sink);
        self
    }

    pub async fn run(&self, ctx: &LifecycleContext<'_>) -> Result<DeploymentReport> {
        let start_time = Instant::now();
        let mut report = DeploymentReport::default();

        for database in ctx.topology.databases() {
            report.databases_visited += 1;

            let connection = ctx.connections.connection_for(&database, ctx.cancel).await?;

            for link in database.project_links() {
                let mut service = DeploymentService::new(connection.clone(), self.engine.clone());
                let sink = self.sink.clone();
                service.on_message(move |message| sink(message));

                let project_path = ctx.topology.project_path(&link.project)?;
                let reference = self.locator.resolve(project_path)?;

                debug!(
                    "Deploying project {} ({:?}) to database {}",
                    link.project,
                    reference.artifact_path,
                    database.name()
                );

                let package = self.loader.load(&reference)?;

                service
                    .deploy(
                        &package,
                        database.target_database(),
                        ALLOW_DATA_LOSS,
                        &self.options,
                        ctx.cancel,
                    )
                    .await?;

                report.deployed.push(DeployedProject {
                    database: database.name().to_string(),
                    project: link.project.clone(),
                    artifact_path: reference.artifact_path,
                    checksum: package.checksum().to_string(),
                });
            }
        }

        report.execution_time_ms = start_time.elapsed().as_millis() as u64;
        Ok(report)
    }
}

fn log_message(message: &DiagnosticMessage) {
    match message.kind {
        MessageKind::Info => info!("{}", message),
        MessageKind::Warning => warn!("{}", message),
        MessageKind::Error => error!("{}", message),
    }
}

#[async_trait]
impl LifecycleHook for DeployDatabaseProjectsHook {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn after_resources_created(&self, ctx: &LifecycleContext<'_>) -> Result<()> {
        let report = self.run(ctx).await?;

        info!(
            "Database project deployment complete: {} databases, {} projects deployed in {}ms",
            report.databases_visited,
            report.deployed.len(),
            report.execution_time_ms
        );

        Ok(())
    }
}

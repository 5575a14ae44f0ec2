use super::message::MessageChannel;
use crate::package::LoadedPackage;
use crate::topology::ConnectionDescriptor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Tunables passed through to the engine for every deploy
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Upper bound for a single script
    pub command_timeout: Duration,
    pub include_predeploy: bool,
    pub include_postdeploy: bool,
    /// Redeploy even when the same package checksum is already recorded
    pub always_redeploy: bool,
    /// Values for `$(Name)` placeholders; override header defaults
    pub sqlcmd_variables: HashMap<String, String>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(60),
            include_predeploy: true,
            include_postdeploy: true,
            always_redeploy: false,
            sqlcmd_variables: HashMap::new(),
        }
    }
}

pub struct DeployRequest<'a> {
    pub connection: &'a ConnectionDescriptor,
    pub package: &'a LoadedPackage,
    pub target_database: &'a str,
    pub allow_data_loss: bool,
    pub create_if_absent: bool,
    pub options: &'a DeployOptions,
    pub cancel: &'a CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SchemaConflict,
    Connectivity,
    Timeout,
    DataLoss,
    Cancelled,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::SchemaConflict => "schema conflict",
            FailureKind::Connectivity => "connectivity",
            FailureKind::Timeout => "timeout",
            FailureKind::DataLoss => "possible data loss",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Other => "engine failure",
        };
        f.write_str(name)
    }
}

/// Structured failure reported by an engine; `message` is shown to operators as is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl EngineFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Applies a loaded package to a live database
#[async_trait]
pub trait DeploymentEngine: Send + Sync {
    async fn deploy(
        &self,
        request: DeployRequest<'_>,
        messages: &MessageChannel,
    ) -> std::result::Result<(), EngineFailure>;
}

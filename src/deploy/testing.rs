//! In-memory engine for exercising deployments without a database server

use super::engine::{DeployRequest, DeploymentEngine, EngineFailure};
use super::message::MessageChannel;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedDeploy {
    pub connection: String,
    pub target_database: String,
    pub package_name: String,
    pub allow_data_loss: bool,
    pub create_if_absent: bool,
}

#[derive(Default)]
pub(crate) struct RecordingEngine {
    calls: Mutex<Vec<RecordedDeploy>>,
    failures: Mutex<HashMap<String, EngineFailure>>,
    delay: Option<Duration>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make every deploy of `package_name` fail
    pub fn fail_package(&self, package_name: &str, failure: EngineFailure) {
        self.failures
            .lock()
            .unwrap()
            .insert(package_name.to_string(), failure);
    }

    pub fn calls(&self) -> Vec<RecordedDeploy> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentEngine for RecordingEngine {
    async fn deploy(
        &self,
        request: DeployRequest<'_>,
        messages: &MessageChannel,
    ) -> std::result::Result<(), EngineFailure> {
        let package_name = request.package.name().to_string();

        self.calls.lock().unwrap().push(RecordedDeploy {
            connection: request.connection.as_str().to_string(),
            target_database: request.target_database.to_string(),
            package_name: package_name.clone(),
            allow_data_loss: request.allow_data_loss,
            create_if_absent: request.create_if_absent,
        });

        messages.info(format!(
            "Deploying {} to {}",
            package_name, request.target_database
        ));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().unwrap().get(&package_name).cloned();
        if let Some(failure) = failure {
            messages.error(failure.message.clone());
            return Err(failure);
        }

        messages.info(format!("Deployed {}", package_name));
        Ok(())
    }
}

use crate::artifact::ArtifactLocator;
use crate::deploy::DeployOptions;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub topology_file: PathBuf,
    pub database_url: String,
    pub build_configuration: String,
    pub target_framework: String,
    pub maintenance_database: String,
    pub command_timeout: Duration,
    pub always_redeploy: bool,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Build database_url from individual fields or use DATABASE_URL if provided
        let database_url = if let Ok(url) = env::var("DATABASE_URL") {
            url
        } else {
            let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
            let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
            let db_user = env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
            let db_password = env::var("DB_PASSWORD").unwrap_or_else(|_| "password".to_string());

            // URL-encode password to handle special characters
            let encoded_password = urlencoding::encode(&db_password);

            format!("postgres://{}:{}@{}:{}/postgres", db_user, encoded_password, db_host, db_port)
        };

        let topology_file = env::var("TOPOLOGY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./topology.json"));

        let build_configuration =
            env::var("BUILD_CONFIGURATION").unwrap_or_else(|_| "Debug".to_string());

        let target_framework =
            env::var("TARGET_FRAMEWORK").unwrap_or_else(|_| "netstandard2.0".to_string());

        let maintenance_database =
            env::var("MAINTENANCE_DATABASE").unwrap_or_else(|_| "postgres".to_string());

        let command_timeout_secs: u64 = env::var("COMMAND_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let always_redeploy = env::var("ALWAYS_REDEPLOY")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let log_dir = env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./logs"));

        Ok(Config {
            topology_file,
            database_url,
            build_configuration,
            target_framework,
            maintenance_database,
            command_timeout: Duration::from_secs(command_timeout_secs),
            always_redeploy,
            log_dir,
        })
    }

    pub fn locator(&self) -> ArtifactLocator {
        ArtifactLocator::new(&self.build_configuration, &self.target_framework)
    }

    pub fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            command_timeout: self.command_timeout,
            always_redeploy: self.always_redeploy,
            ..DeployOptions::default()
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

//! PostgreSQL deployment engine
//!
//! Rules:
//! - The target database is created from the maintenance database when absent
//! - All scripts of a package run in one transaction; any failure rolls back
//! - Deployed packages are recorded in `_dacpac_deploy_history`; a package whose
//!   checksum matches the last recorded deploy is skipped
//! - Without `allow_data_loss`, scripts containing destructive statements are refused

use super::engine::{DeployOptions, DeployRequest, DeploymentEngine, EngineFailure, FailureKind};
use super::message::MessageChannel;
use crate::metadata::PackageHeader;
use crate::package::Script;
use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tokio_postgres::NoTls;
use tracing::{debug, info};

const HISTORY_TABLE_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS _dacpac_deploy_history (
        id SERIAL PRIMARY KEY,
        package_name TEXT NOT NULL,
        package_version TEXT NOT NULL,
        checksum TEXT NOT NULL,
        deployed_at TIMESTAMPTZ DEFAULT NOW()
    )
"#;

const MAX_IDENTIFIER_LENGTH: usize = 63;

pub struct PostgresEngine {
    maintenance_database: String,
}

impl PostgresEngine {
    pub fn new(maintenance_database: impl Into<String>) -> Self {
        Self {
            maintenance_database: maintenance_database.into(),
        }
    }

    async fn ensure_database(
        &self,
        request: &DeployRequest<'_>,
        messages: &MessageChannel,
    ) -> Result<(), EngineFailure> {
        let admin_url = request.connection.with_database(&self.maintenance_database);
        let pool = create_pool(admin_url.as_str())?;
        let client = pool.get().await.map_err(|e| {
            EngineFailure::new(
                FailureKind::Connectivity,
                format!("Failed to connect to {}: {}", admin_url.redacted(), e),
            )
        })?;

        let exists = client
            .query_opt(
                "SELECT 1 FROM pg_database WHERE datname = $1",
                &[&request.target_database],
            )
            .await
            .map_err(|e| classify(&e))?
            .is_some();

        if exists {
            debug!("Database {} already exists", request.target_database);
            return Ok(());
        }

        if !request.create_if_absent {
            return Err(EngineFailure::new(
                FailureKind::Other,
                format!("Database {} does not exist", request.target_database),
            ));
        }

        let quoted = quote_identifier(request.target_database)?;
        messages.info(format!("Creating database {}", request.target_database));

        // CREATE DATABASE cannot take parameters or run inside a transaction
        client
            .batch_execute(&format!("CREATE DATABASE {}", quoted))
            .await
            .map_err(|e| classify(&e))?;

        info!("Created database: {}", request.target_database);
        Ok(())
    }
}

#[async_trait]
impl DeploymentEngine for PostgresEngine {
    async fn deploy(
        &self,
        request: DeployRequest<'_>,
        messages: &MessageChannel,
    ) -> Result<(), EngineFailure> {
        let package = request.package;
        let options = request.options;

        messages.info(format!(
            "Initializing deployment of {} {} to {}",
            package.name(),
            package.header().version,
            request.target_database
        ));

        self.ensure_database(&request, messages).await?;

        let target_url = request.connection.with_database(request.target_database);
        let pool = create_pool(target_url.as_str())?;
        let mut client = pool.get().await.map_err(|e| {
            EngineFailure::new(
                FailureKind::Connectivity,
                format!("Failed to connect to {}: {}", target_url.redacted(), e),
            )
        })?;

        client
            .batch_execute(HISTORY_TABLE_DDL)
            .await
            .map_err(|e| classify(&e))?;

        let last_checksum: Option<String> = client
            .query_opt(
                "SELECT checksum FROM _dacpac_deploy_history WHERE package_name = $1 ORDER BY id DESC LIMIT 1",
                &[&package.name()],
            )
            .await
            .map_err(|e| classify(&e))?
            .map(|row| row.get(0));

        if last_checksum.as_deref() == Some(package.checksum()) && !options.always_redeploy {
            messages.info(format!(
                "Package {} (checksum: {}) is already deployed to {}; no changes applied",
                package.name(),
                package.checksum(),
                request.target_database
            ));
            return Ok(());
        }

        let plan = package.deployment_plan(options.include_predeploy, options.include_postdeploy);

        if !request.allow_data_loss {
            if let Some((script, statement)) = find_possible_data_loss(&plan) {
                let message = format!(
                    "Script {} contains '{}' which may cause data loss",
                    script, statement
                );
                messages.error(message.clone());
                return Err(EngineFailure::new(FailureKind::DataLoss, message));
            }
        }

        let variables = resolve_variables(package.header(), options)?;

        let pg_client: &mut tokio_postgres::Client = &mut client;
        let transaction = pg_client.transaction().await.map_err(|e| classify(&e))?;

        for script in &plan {
            if request.cancel.is_cancelled() {
                messages.warning("Deployment cancelled; rolling back");
                return Err(EngineFailure::new(
                    FailureKind::Cancelled,
                    format!("Cancelled before {}", script.name),
                ));
            }

            messages.info(format!("Executing {}", script.name));
            let sql = substitute_variables(&script.sql, &variables);

            match tokio::time::timeout(options.command_timeout, transaction.batch_execute(&sql)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let failure = classify(&e);
                    messages.error(format!("{} failed: {}", script.name, failure.message));
                    return Err(failure);
                }
                Err(_) => {
                    let message = format!(
                        "{} did not complete within {:?}",
                        script.name, options.command_timeout
                    );
                    messages.error(message.clone());
                    return Err(EngineFailure::new(FailureKind::Timeout, message));
                }
            }
        }

        transaction
            .execute(
                "INSERT INTO _dacpac_deploy_history (package_name, package_version, checksum) VALUES ($1, $2, $3)",
                &[&package.name(), &package.header().version, &package.checksum()],
            )
            .await
            .map_err(|e| classify(&e))?;

        transaction.commit().await.map_err(|e| classify(&e))?;

        messages.info(format!(
            "Successfully deployed {} ({} scripts) to {}",
            package.name(),
            plan.len(),
            request.target_database
        ));

        Ok(())
    }
}

fn create_pool(database_url: &str) -> Result<Pool, EngineFailure> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: 1,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(10)),
            create: Some(Duration::from_secs(10)),
            recycle: Some(Duration::from_secs(10)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
        EngineFailure::new(
            FailureKind::Connectivity,
            format!("Failed to create pool: {}", e),
        )
    })
}

fn classify(err: &tokio_postgres::Error) -> EngineFailure {
    match err.as_db_error() {
        Some(db) => {
            let code = db.code().code();
            let kind = if code.starts_with("42") || code.starts_with("23") {
                FailureKind::SchemaConflict
            } else if code.starts_with("08") {
                FailureKind::Connectivity
            } else if code == "57014" {
                FailureKind::Timeout
            } else {
                FailureKind::Other
            };
            EngineFailure::new(kind, db.message().to_string())
        }
        None => EngineFailure::new(FailureKind::Connectivity, err.to_string()),
    }
}

fn quote_identifier(name: &str) -> Result<String, EngineFailure> {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LENGTH || name.contains('\0') {
        return Err(EngineFailure::new(
            FailureKind::Other,
            format!("Invalid database name: {}", name),
        ));
    }

    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// First destructive statement in the plan, as (script name, matched text)
fn find_possible_data_loss(plan: &[&Script]) -> Option<(String, String)> {
    let destructive =
        Regex::new(r"(?i)\b(DROP\s+TABLE|DROP\s+SCHEMA|DROP\s+COLUMN|TRUNCATE)\b").unwrap();

    plan.iter().find_map(|script| {
        destructive
            .find(&script.sql)
            .map(|m| (script.name.clone(), m.as_str().to_string()))
    })
}

fn resolve_variables(
    header: &PackageHeader,
    options: &DeployOptions,
) -> Result<HashMap<String, String>, EngineFailure> {
    let mut variables = options.sqlcmd_variables.clone();

    for (name, default_value) in header.sqlcmd_variables() {
        if variables.contains_key(&name) {
            continue;
        }
        if default_value.is_empty() {
            return Err(EngineFailure::new(
                FailureKind::Other,
                format!("Missing value for sqlcmd variable $({})", name),
            ));
        }
        variables.insert(name, default_value);
    }

    Ok(variables)
}

/// Replace `$(Name)` placeholders; unknown names are left untouched
fn substitute_variables(sql: &str, variables: &HashMap<String, String>) -> String {
    if variables.is_empty() {
        return sql.to_string();
    }

    let placeholder = Regex::new(r"\$\((\w+)\)").unwrap();
    placeholder
        .replace_all(sql, |caps: &regex::Captures| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

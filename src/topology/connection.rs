use super::resource::{DatabaseResource, ResourceKind, Topology};
use crate::deploy::CancellationToken;
use crate::error::{DeployError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use url::Url;

const MASK: &str = "***";

/// Query parameters that carry credentials
const SECRET_PARAMS: &[&str] = &["password", "passfile", "sslpassword"];

/// A validated `postgres://` connection URL
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    url: Url,
}

impl ConnectionDescriptor {
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url.trim()).map_err(|e| {
            DeployError::configuration(format!("Invalid connection string: {}", e))
        })?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DeployError::configuration(format!(
                "Connection string must be a postgres:// URL, got scheme '{}'",
                url.scheme()
            )));
        }

        let descriptor = Self { url };

        if descriptor.url.host_str().map_or(true, str::is_empty) {
            return Err(DeployError::configuration(format!(
                "Connection string '{}' does not name a host",
                descriptor.redacted()
            )));
        }

        Ok(descriptor)
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Database named in the URL path, if any
    pub fn database(&self) -> Option<String> {
        let segment = self.url.path().trim_start_matches('/');
        if segment.is_empty() {
            return None;
        }
        Some(
            urlencoding::decode(segment)
                .map(|name| name.into_owned())
                .unwrap_or_else(|_| segment.to_string()),
        )
    }

    /// Same server, credentials and parameters, pointed at `database`
    pub fn with_database(&self, database: &str) -> ConnectionDescriptor {
        let mut url = self.url.clone();
        url.set_path(&format!("/{}", urlencoding::encode(database)));
        ConnectionDescriptor { url }
    }

    /// URL with the password and credential parameters masked, for logs
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();

        if url.password().is_some() {
            let _ = url.set_password(Some(MASK));
        }

        let has_secret = url.query_pairs().any(|(key, _)| is_secret_param(&key));
        if has_secret {
            let pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(key, value)| {
                    let value = if is_secret_param(&key) {
                        MASK.to_string()
                    } else {
                        value.into_owned()
                    };
                    (key.into_owned(), value)
                })
                .collect();
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }

        url.into()
    }
}

fn is_secret_param(key: &str) -> bool {
    SECRET_PARAMS.iter().any(|p| key.eq_ignore_ascii_case(p))
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("url", &self.redacted())
            .finish()
    }
}

/// Produces the live connection for a database resource
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    async fn connection_for(
        &self,
        database: &DatabaseResource<'_>,
        cancel: &CancellationToken,
    ) -> Result<ConnectionDescriptor>;
}

/// Resolves databases through the connection string of their server resource
pub struct ServerConnectionResolver {
    servers: HashMap<String, Option<String>>,
    fallback: Option<String>,
}

impl ServerConnectionResolver {
    /// `fallback` is used for servers that declare no connection string
    pub fn from_topology(topology: &Topology, fallback: Option<String>) -> Self {
        let servers = topology
            .resources()
            .iter()
            .filter_map(|r| match &r.kind {
                ResourceKind::Server { connection_string } => {
                    Some((r.name.clone(), connection_string.clone()))
                }
                _ => None,
            })
            .collect();

        Self { servers, fallback }
    }
}

#[async_trait]
impl ConnectionResolver for ServerConnectionResolver {
    async fn connection_for(
        &self,
        database: &DatabaseResource<'_>,
        cancel: &CancellationToken,
    ) -> Result<ConnectionDescriptor> {
        if cancel.is_cancelled() {
            return Err(DeployError::Cancelled {
                database: database.name().to_string(),
            });
        }

        let declared = self.servers.get(database.server()).ok_or_else(|| {
            DeployError::ConnectionUnavailable {
                resource: database.name().to_string(),
                cause: format!("server resource '{}' is not declared", database.server()),
            }
        })?;

        let server_url = declared
            .as_deref()
            .or(self.fallback.as_deref())
            .ok_or_else(|| DeployError::ConnectionUnavailable {
                resource: database.name().to_string(),
                cause: format!(
                    "server resource '{}' has no connection string",
                    database.server()
                ),
            })?;

        let server = ConnectionDescriptor::parse(server_url).map_err(|e| {
            DeployError::ConnectionUnavailable {
                resource: database.name().to_string(),
                cause: e.to_string(),
            }
        })?;

        let connection = server.with_database(database.target_database());
        debug!(
            "Resolved connection for {}: {}",
            database.name(),
            connection.redacted()
        );

        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyBuilder;

    #[test]
    fn test_parse_and_database() {
        let conn = ConnectionDescriptor::parse("postgres://sa:pw@localhost:5432/postgres").unwrap();
        assert_eq!(conn.database().as_deref(), Some("postgres"));

        let conn = ConnectionDescriptor::parse("postgresql://localhost").unwrap();
        assert_eq!(conn.database(), None);

        assert!(ConnectionDescriptor::parse("Server=localhost;Database=x").is_err());
        assert!(ConnectionDescriptor::parse("mysql://localhost/x").is_err());
        assert!(ConnectionDescriptor::parse("postgres://").is_err());
        assert!(ConnectionDescriptor::parse("postgres://user@").is_err());
    }

    #[test]
    fn test_with_database_keeps_query() {
        let conn =
            ConnectionDescriptor::parse("postgres://sa:pw@localhost:5432/postgres?sslmode=disable")
                .unwrap();
        let target = conn.with_database("catalogdb");
        assert_eq!(
            target.as_str(),
            "postgres://sa:pw@localhost:5432/catalogdb?sslmode=disable"
        );
        assert_eq!(target.database().as_deref(), Some("catalogdb"));

        let bare = ConnectionDescriptor::parse("postgres://localhost?sslmode=disable").unwrap();
        assert_eq!(
            bare.with_database("orders").as_str(),
            "postgres://localhost/orders?sslmode=disable"
        );
    }

    #[test]
    fn test_slash_in_query_is_not_a_database() {
        let server = ConnectionDescriptor::parse(
            "postgres://sa:pw@localhost:5432?options=-c%20search_path=a/b",
        )
        .unwrap();
        assert_eq!(server.database(), None);

        let target = server.with_database("catalogdb");
        assert_eq!(
            target.as_str(),
            "postgres://sa:pw@localhost:5432/catalogdb?options=-c%20search_path=a/b"
        );
        assert_eq!(target.database().as_deref(), Some("catalogdb"));
    }

    #[test]
    fn test_with_database_encodes_name() {
        let server = ConnectionDescriptor::parse("postgres://localhost:5432").unwrap();
        let target = server.with_database("catalog db");
        assert_eq!(target.as_str(), "postgres://localhost:5432/catalog%20db");
        assert_eq!(target.database().as_deref(), Some("catalog db"));
    }

    #[test]
    fn test_redacted_hides_password() {
        let conn = ConnectionDescriptor::parse("postgres://sa:s3cret@db:5432/catalog").unwrap();
        assert_eq!(conn.redacted(), "postgres://sa:***@db:5432/catalog");
        assert!(!conn.to_string().contains("s3cret"));
        assert!(!format!("{:?}", conn).contains("s3cret"));

        let conn = ConnectionDescriptor::parse("postgres://db:5432/catalog").unwrap();
        assert_eq!(conn.redacted(), "postgres://db:5432/catalog");
    }

    #[test]
    fn test_redacted_hides_password_parameter() {
        let conn = ConnectionDescriptor::parse(
            "postgres://db:5432/catalog?user=sa&password=s3cret&sslmode=require",
        )
        .unwrap();
        let redacted = conn.redacted();
        assert!(!redacted.contains("s3cret"));
        assert_eq!(
            redacted,
            "postgres://db:5432/catalog?user=sa&password=***&sslmode=require"
        );

        let plain = ConnectionDescriptor::parse("postgres://db:5432/catalog?sslmode=require").unwrap();
        assert_eq!(plain.redacted(), plain.as_str());
    }

    #[test]
    fn test_cancelled_resolution_fails_fast() {
        let topology = TopologyBuilder::new()
            .add_server("sql", Some("postgres://localhost:5432/postgres"))
            .add_database("catalogdb", "sql")
            .build()
            .unwrap();
        let resolver = ServerConnectionResolver::from_topology(&topology, None);
        let catalog = topology.get("catalogdb").unwrap().as_database().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = tokio_test::block_on(resolver.connection_for(&catalog, &cancel)).unwrap_err();
        assert!(matches!(err, DeployError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_server_resolver() {
        let topology = TopologyBuilder::new()
            .add_server("sql", Some("postgres://sa:pw@localhost:5432/postgres"))
            .add_server("other", None)
            .add_database("catalogdb", "sql")
            .add_database("ordersdb", "other")
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let resolver = ServerConnectionResolver::from_topology(&topology, None);

        let catalog = topology.get("catalogdb").unwrap().as_database().unwrap();
        let conn = resolver.connection_for(&catalog, &cancel).await.unwrap();
        assert_eq!(conn.as_str(), "postgres://sa:pw@localhost:5432/catalogdb");

        let orders = topology.get("ordersdb").unwrap().as_database().unwrap();
        let err = resolver.connection_for(&orders, &cancel).await.unwrap_err();
        assert!(matches!(err, DeployError::ConnectionUnavailable { .. }));

        let with_fallback = ServerConnectionResolver::from_topology(
            &topology,
            Some("postgres://localhost:5432/postgres".to_string()),
        );
        let conn = with_fallback.connection_for(&orders, &cancel).await.unwrap();
        assert_eq!(conn.as_str(), "postgres://localhost:5432/ordersdb");

        cancel.cancel();
        let err = resolver.connection_for(&catalog, &cancel).await.unwrap_err();
        assert!(matches!(err, DeployError::Cancelled { .. }));
    }
}

//! Graph connection lifecycle
//!
//! A [`GraphConnector`] hands out one [`GraphSession`] per router run. The run
//! owns it through a [`ConnectionGuard`], which closes the session exactly once:
//! either explicitly via [`ConnectionGuard::release`] or when the guard is
//! dropped (normal return, unwinding, or the run future being aborted).

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::GraphConfig;
use crate::error::ConnectionError;

/// Source of per-run graph sessions. Shared across concurrent runs.
#[async_trait]
pub trait GraphConnector: Send + Sync {
    /// Open a session and verify it is usable
    async fn acquire(&self) -> Result<Box<dyn GraphSession>, ConnectionError>;
}

/// An open graph session, exclusively owned by one run.
pub trait GraphSession: Send + Sync {
    /// Identifier for logs
    fn id(&self) -> Uuid;

    /// Close the session. Errors are logged by the guard, never propagated.
    fn close(self: Box<Self>) -> anyhow::Result<()>;
}

/// Scoped owner of a run's graph session.
#[derive(Default)]
pub struct ConnectionGuard {
    session: Option<Box<dyn GraphSession>>,
}

impl ConnectionGuard {
    /// Guard with nothing acquired yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Take ownership of a freshly acquired session.
    ///
    /// A session already held is released first.
    pub fn attach(&mut self, session: Box<dyn GraphSession>) {
        self.release();
        tracing::debug!(session_id = %session.id(), "graph session acquired");
        self.session = Some(session);
    }

    pub fn is_held(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&dyn GraphSession> {
        self.session.as_deref()
    }

    /// Close the held session, if any. Idempotent.
    pub fn release(&mut self) {
        if let Some(session) = self.session.take() {
            let session_id = session.id();
            match session.close() {
                Ok(()) => tracing::debug!(session_id = %session_id, "graph session released"),
                Err(e) => tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "error closing graph session"
                ),
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("session", &self.session.as_ref().map(|s| s.id()))
            .finish()
    }
}

/// Connector for a Neo4j server's HTTP endpoint.
///
/// Acquisition checks connectivity against the discovery endpoint with the
/// configured credentials before handing out a session.
#[derive(Clone)]
pub struct Neo4jHttpConnector {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    database: String,
}

impl Neo4jHttpConnector {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self, ConnectionError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConnectionError::NotConfigured(format!(
                "NEO4J_URI must be an http(s) URL, got '{}'",
                base_url
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            username: username.into(),
            password: password.into(),
            database: database.into(),
        })
    }

    /// Build from the graph section of the router configuration
    pub fn from_config(config: &GraphConfig) -> Result<Self, ConnectionError> {
        let uri = config
            .uri
            .clone()
            .ok_or_else(|| ConnectionError::NotConfigured("NEO4J_URI is not set".into()))?;
        let username = config
            .username
            .clone()
            .ok_or_else(|| ConnectionError::NotConfigured("NEO4J_USERNAME is not set".into()))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| ConnectionError::NotConfigured("NEO4J_PASSWORD is not set".into()))?;

        Self::new(uri, username, password, config.database.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GraphConnector for Neo4jHttpConnector {
    async fn acquire(&self) -> Result<Box<dyn GraphSession>, ConnectionError> {
        let response = self
            .client
            .get(&self.base_url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConnectionError::Rejected {
                status: response.status().as_u16(),
            });
        }

        let session = Neo4jSession { id: Uuid::new_v4() };
        tracing::info!(
            session_id = %session.id,
            database = %self.database,
            "connected to Neo4j"
        );
        Ok(Box::new(session))
    }
}

/// Verified Neo4j session.
#[derive(Debug)]
pub struct Neo4jSession {
    id: Uuid,
}

impl GraphSession for Neo4jSession {
    fn id(&self) -> Uuid {
        self.id
    }

    fn close(self: Box<Self>) -> anyhow::Result<()> {
        tracing::info!(session_id = %self.id, "Neo4j connection closed");
        Ok(())
    }
}

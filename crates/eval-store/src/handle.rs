//! SurrealDB connection targets
//!
//! Resolves where the result store lives (in-memory, a URL, or SurrealDB
//! Cloud) and opens an authenticated connection with the namespace and
//! database selected.

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StoreError;
use crate::Result;

const DEFAULT_NAMESPACE: &str = "evalai";
const DEFAULT_DATABASE: &str = "results";
const DEFAULT_LOCAL_PATH: &str = ".evalai/db";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "evalai")
    pub namespace: String,
    /// Database name (default: "results")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "evalai")
    /// - SURREALDB_DATABASE (optional, default: "results")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// Where the result store lives.
#[derive(Debug, Clone)]
pub enum StoreTarget {
    /// `mem://`, lost when the process exits
    Memory,
    /// Any SurrealDB URL (`surrealkv://path`, `ws://host:port`, ...)
    Url(String),
    /// SurrealDB Cloud with credentials
    Cloud(CloudConfig),
}

impl StoreTarget {
    /// Resolve from the environment.
    ///
    /// Order: `EVALAI_DB` URL, then SurrealDB Cloud variables, then local
    /// persistence under `.evalai/db`.
    pub fn from_env() -> Self {
        if let Ok(url) = std::env::var("EVALAI_DB") {
            return StoreTarget::Url(url);
        }
        if let Ok(config) = CloudConfig::from_env() {
            return StoreTarget::Cloud(config);
        }
        StoreTarget::Url(format!("surrealkv://{}", DEFAULT_LOCAL_PATH))
    }

    pub fn describe(&self) -> String {
        match self {
            StoreTarget::Memory => "mem://".to_string(),
            StoreTarget::Url(url) => url.clone(),
            StoreTarget::Cloud(config) => config.endpoint.clone(),
        }
    }
}

/// Open a connection to `target` with namespace and database selected.
#[instrument(skip_all, fields(target = %target.describe()))]
pub async fn connect(target: &StoreTarget) -> Result<Surreal<Any>> {
    match target {
        StoreTarget::Memory => open_url("mem://", DEFAULT_NAMESPACE, DEFAULT_DATABASE).await,
        StoreTarget::Url(url) => {
            if let Some(path) = url.strip_prefix("surrealkv://") {
                std::fs::create_dir_all(path).map_err(|e| {
                    StoreError::Connection(format!(
                        "Failed to create database directory {}: {}",
                        path, e
                    ))
                })?;
            }
            open_url(url, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
        }
        StoreTarget::Cloud(config) => open_cloud(config).await,
    }
}

async fn open_url(url: &str, namespace: &str, database: &str) -> Result<Surreal<Any>> {
    let db = surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StoreError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

    db.use_ns(namespace)
        .use_db(database)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    info!("Result store connected ({})", url);
    Ok(db)
}

async fn open_cloud(config: &CloudConfig) -> Result<Surreal<Any>> {
    let db = surrealdb::engine::any::connect(&config.endpoint)
        .await
        .map_err(|e| {
            StoreError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
        })?;

    if config.is_root {
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StoreError::Connection(format!("Root auth failed: {e}")))?;
    } else {
        db.signin(Database {
            namespace: &config.namespace,
            database: &config.database,
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StoreError::Connection(format!("DB auth failed: {e}")))?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    info!("Result store connected (cloud, root={})", config.is_root);
    Ok(db)
}

use crate::connection::ConnectionProfile;
use crate::error::{Result, TenantError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tenantable_database::{DatabaseConfig, EncryptionConfig};

/// Host application settings the resolver reads and writes.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantableConfig {
    /// Landlord database holding the tenant tables
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Name of the default connection before any tenant is resolved
    #[serde(default = "default_connection")]
    pub default_connection: String,

    /// Named connection profiles (`database.connections.*`)
    #[serde(default)]
    pub connections: HashMap<String, ConnectionProfile>,

    #[serde(default)]
    pub encryption: EncryptionConfig,

    /// Base URL before tenant resolution rewrites it
    #[serde(default)]
    pub app_url: Option<String>,
}

fn default_database_url() -> String {
    tenantable_database::connection::DEFAULT_LANDLORD_URL.to_string()
}

fn default_connection() -> String {
    "landlord".to_string()
}

impl Default for TenantableConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            default_connection: default_connection(),
            connections: HashMap::new(),
            encryption: EncryptionConfig::default(),
            app_url: None,
        }
    }
}

impl TenantableConfig {
    /// Load configuration from environment variables
    ///
    /// - DATABASE_URL: landlord database
    /// - TENANTABLE_DEFAULT_CONNECTION: default connection name (`landlord`)
    /// - TENANTABLE_ENCRYPT / TENANTABLE_ENCRYPTION_KEY: credential encryption
    /// - APP_URL: base URL
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url());
        let default_connection = std::env::var("TENANTABLE_DEFAULT_CONNECTION")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_connection);

        let mut connections = HashMap::new();
        connections.insert(
            default_connection.clone(),
            ConnectionProfile {
                driver: "pgsql".to_string(),
                url: Some(database_url.clone()),
                ..Default::default()
            },
        );

        Self {
            database_url,
            default_connection,
            connections,
            encryption: EncryptionConfig::from_env(),
            app_url: std::env::var("APP_URL").ok(),
        }
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TenantError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| TenantError::Config(e.to_string()))
    }

    /// Landlord pool settings, keeping pool sizing from the environment
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database_url.clone(),
            ..DatabaseConfig::from_env()
        }
    }
}

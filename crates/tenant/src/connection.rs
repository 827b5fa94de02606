//! Connection context switch
//!
//! The registry holds the invocation's named connection profiles, the name
//! of the default connection and any pools opened so far. The default
//! connection only changes through `activate_tenant`, `restore_original`
//! and `reconnect_tenant`.

use crate::error::{Result, TenantError};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tenantable_models::TenantCredentials;

/// Name of the connection profile rebuilt for every resolved tenant
pub const TENANT_CONNECTION: &str = "tenant";
pub const TENANT_CHARSET: &str = "utf8";
pub const TENANT_COLLATION: &str = "utf8_unicode_ci";

const POSTGRES_DRIVERS: [&str; 3] = ["pgsql", "postgres", "postgresql"];

/// One named data connection (`database.connections.<name>`)
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub driver: String,
    /// Full connection URL; takes precedence over the discrete fields
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub charset: String,
    #[serde(default)]
    pub collation: String,
    #[serde(default)]
    pub strict: Option<bool>,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("driver", &self.driver)
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("prefix", &self.prefix)
            .field("charset", &self.charset)
            .field("collation", &self.collation)
            .field("strict", &self.strict)
            .finish()
    }
}

impl ConnectionProfile {
    /// Profile for a tenant's decrypted credentials. A non-empty prefix
    /// gets its trailing underscore here; it is never stored with one.
    pub fn for_tenant(credentials: &TenantCredentials, strict: Option<bool>) -> Self {
        let prefix = if credentials.prefix.is_empty() {
            String::new()
        } else {
            format!("{}_", credentials.prefix)
        };

        Self {
            driver: credentials.driver.clone(),
            url: None,
            host: credentials.host.clone(),
            port: None,
            database: credentials.database.clone(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            prefix,
            charset: TENANT_CHARSET.to_string(),
            collation: TENANT_COLLATION.to_string(),
            strict,
        }
    }

    pub fn is_postgres(&self) -> bool {
        POSTGRES_DRIVERS.contains(&self.driver.to_lowercase().as_str())
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if !self.is_postgres() {
            return Err(TenantError::Connection(format!(
                "Driver '{}' has no pool support",
                self.driver
            )));
        }

        if let Some(url) = &self.url {
            return url
                .parse()
                .map_err(|e| TenantError::Connection(format!("Invalid connection URL: {}", e)));
        }

        // `host` may carry an explicit port ("db.internal:6432")
        let (host, port) = match self.host.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
                (host, port.parse().ok())
            }
            _ => (self.host.as_str(), None),
        };

        Ok(PgConnectOptions::new()
            .host(host)
            .port(self.port.or(port).unwrap_or(5432))
            .database(&self.database)
            .username(&self.username)
            .password(&self.password))
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    default: String,
    original: Option<String>,
    profiles: HashMap<String, ConnectionProfile>,
    pools: HashMap<String, PgPool>,
}

impl ConnectionRegistry {
    pub fn new(default: impl Into<String>, profiles: HashMap<String, ConnectionProfile>) -> Self {
        Self {
            default: default.into(),
            original: None,
            profiles,
            pools: HashMap::new(),
        }
    }

    pub fn default_connection(&self) -> &str {
        &self.default
    }

    /// Default connection recorded before the first tenant switch
    pub fn original_connection(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// Record the current default as the original, once.
    pub fn remember_original(&mut self) {
        if self.original.is_none() {
            self.original = Some(self.default.clone());
        }
    }

    pub fn profile(&self, name: &str) -> Option<&ConnectionProfile> {
        self.profiles.get(name)
    }

    pub fn default_profile(&self) -> Option<&ConnectionProfile> {
        self.profiles.get(&self.default)
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    /// Pool for the named connection, opened lazily on first use.
    pub fn pool(&mut self, name: &str) -> Result<PgPool> {
        if let Some(pool) = self.pools.get(name) {
            return Ok(pool.clone());
        }

        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| TenantError::Connection(format!("Connection [{}] not configured", name)))?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_lazy_with(profile.connect_options()?);

        tracing::debug!("Opened pool for connection [{}]", name);

        self.pools.insert(name.to_string(), pool.clone());
        Ok(pool)
    }

    /// Pool for whatever connection is currently the default.
    pub fn default_pool(&mut self) -> Result<PgPool> {
        let name = self.default.clone();
        self.pool(&name)
    }

    /// Rebuild the `tenant` profile from `credentials`, drop any pool opened
    /// for the previous tenant and make `tenant` the default connection.
    pub fn activate_tenant(&mut self, credentials: &TenantCredentials) {
        let strict = self.strict_for_driver(&credentials.driver);
        self.profiles.insert(
            TENANT_CONNECTION.to_string(),
            ConnectionProfile::for_tenant(credentials, strict),
        );
        self.purge(TENANT_CONNECTION);
        self.set_default_connection(TENANT_CONNECTION);
    }

    /// Leave tenant context: the original default becomes the default again.
    pub fn restore_original(&mut self) {
        match self.original.clone() {
            Some(original) => self.set_default_connection(&original),
            None => tracing::debug!("No original connection recorded, keeping [{}]", self.default),
        }
    }

    /// Make `tenant` the default again without rebuilding its profile.
    pub fn reconnect_tenant(&mut self) {
        self.set_default_connection(TENANT_CONNECTION);
    }

    /// Close and forget the pool cached for `name`.
    fn purge(&mut self, name: &str) -> bool {
        self.pools.remove(name).is_some()
    }

    fn set_default_connection(&mut self, name: &str) {
        if self.default != name {
            tracing::debug!("Default connection [{}] -> [{}]", self.default, name);
        }
        self.default = name.to_string();
    }

    /// Strict flag of the host's own connection for the same driver family:
    /// the profile named after the driver, else the original default when
    /// its driver matches.
    fn strict_for_driver(&self, driver: &str) -> Option<bool> {
        if let Some(profile) = self.profiles.get(driver) {
            return profile.strict;
        }

        self.original
            .as_ref()
            .and_then(|name| self.profiles.get(name))
            .filter(|profile| profile.driver.eq_ignore_ascii_case(driver))
            .and_then(|profile| profile.strict)
    }
}

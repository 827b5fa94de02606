use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Tenant row as stored in the `tenants` table.
///
/// `host`, `database`, `username` and `password` hold the *stored* form,
/// which is ciphertext when the encryption policy is on. Read them through
/// the codec accessors in `tenantable-database` rather than directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i64,
    /// Eight lowercase alphanumerics, assigned once at creation.
    pub uuid: String,
    pub name: String,
    pub slug: String,
    /// Primary hostname, unique across tenants.
    pub domain: String,
    pub driver: String,
    pub host: String,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Table prefix without the trailing underscore.
    pub prefix: String,

    #[sqlx(json)]
    pub meta: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create new tenant request. Credential fields are plaintext.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewTenant {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(min = 1, max = 255))]
    pub slug: String,

    #[validate(length(min = 1, max = 255))]
    pub domain: String,

    #[validate(length(min = 1, max = 32))]
    pub driver: String,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub meta: serde_json::Value,

    /// Ignored: uuids are always generated by the directory.
    #[serde(default)]
    pub uuid: Option<String>,
}

/// Partial update. `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTenant {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub slug: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub domain: Option<String>,

    #[validate(length(min = 1, max = 32))]
    pub driver: Option<String>,

    pub host: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub prefix: Option<String>,
    pub meta: Option<serde_json::Value>,

    /// Accepted and discarded; a tenant's uuid never changes.
    #[serde(default)]
    pub uuid: Option<String>,
}

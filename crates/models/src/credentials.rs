use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant attributes that may be encrypted at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialField {
    Host,
    Database,
    Username,
    Password,
}

impl CredentialField {
    pub const ALL: [CredentialField; 4] = [
        CredentialField::Host,
        CredentialField::Database,
        CredentialField::Username,
        CredentialField::Password,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Database => "database",
            Self::Username => "username",
            Self::Password => "password",
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decrypted connection credentials of one tenant.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TenantCredentials {
    pub driver: String,
    pub host: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub prefix: String,
}

// Keep the password out of logs.
impl fmt::Debug for TenantCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantCredentials")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("prefix", &self.prefix)
            .finish()
    }
}

use tenantable_database::DatabaseError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TenantError>;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Command {command} failed for tenant {tenant}: {source}")]
    CommandFailed {
        command: String,
        tenant: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TenantError {
    /// Persistence-layer failure that boot is allowed to swallow.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_persistence())
    }
}

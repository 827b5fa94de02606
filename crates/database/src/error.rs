use tenantable_models::CredentialField;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encryption failed for {field}: {reason}")]
    Encryption {
        field: CredentialField,
        reason: String,
    },

    #[error("Decryption failed for {field}: {reason}")]
    Decryption {
        field: CredentialField,
        reason: String,
    },

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} with id {} not found", entity, id))
    }

    pub fn duplicate(entity: &str, field: &str) -> Self {
        Self::DuplicateEntry(format!("{} with {} already exists", entity, field))
    }

    /// Errors raised by the persistence layer itself (missing tables,
    /// unreachable server, failed migration), as opposed to codec or
    /// validation failures.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Migration(_))
    }

    /// Map a unique-constraint violation to `DuplicateEntry`, pass anything
    /// else through.
    pub(crate) fn from_insert(err: sqlx::Error, entity: &str, field: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::duplicate(entity, field),
            _ => Self::ConnectionError(err),
        }
    }
}

impl From<validator::ValidationErrors> for DatabaseError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidInput(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_classification() {
        assert!(DatabaseError::ConnectionError(sqlx::Error::RowNotFound).is_persistence());
        assert!(!DatabaseError::Decryption {
            field: CredentialField::Password,
            reason: "bad tag".to_string(),
        }
        .is_persistence());
        assert!(!DatabaseError::not_found("Tenant", "7").is_persistence());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DatabaseError::duplicate("Tenant", "domain a.example.com").to_string(),
            "Duplicate entry: Tenant with domain a.example.com already exists"
        );
        assert_eq!(
            DatabaseError::Decryption {
                field: CredentialField::Host,
                reason: "too short".to_string(),
            }
            .to_string(),
            "Decryption failed for host: too short"
        );
    }
}

pub mod connection;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod identifier;
pub mod memory;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use crypto::{CredentialCodec, EncryptedAttributes, EncryptionConfig};
pub use directory::{PgTenantDirectory, TenantDirectory};
pub use error::{DatabaseError, Result};
pub use identifier::{IdentifierGenerator, UUID_LENGTH};
pub use memory::InMemoryTenantDirectory;
pub use repositories::{domains::DomainRepository, tenants::TenantRepository};

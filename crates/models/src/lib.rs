// Core modules
pub mod credentials;
pub mod domain;
pub mod tenant;

// Re-export commonly used types
pub use credentials::{CredentialField, TenantCredentials};
pub use domain::{Domain, NewDomain};
pub use tenant::{NewTenant, Tenant, UpdateTenant};

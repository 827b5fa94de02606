//! Tenant resolution and connection switching
//!
//! Works out which tenant owns the current request (by host) or console
//! invocation (by `--tenant`), then points the invocation's default data
//! connection at that tenant's database.

pub mod boot;
pub mod config;
pub mod connection;
pub mod console;
pub mod context;
pub mod error;
pub mod events;
pub mod extractor;
pub mod middleware;
pub mod resolver;

pub use boot::boot;
pub use config::TenantableConfig;
pub use connection::{ConnectionProfile, ConnectionRegistry, TENANT_CONNECTION};
pub use console::{
    CommandDecision, ConsoleCommand, ConsoleInput, ConsoleOutput, StdConsole, DISABLED_EXIT_CODE,
};
pub use context::TenantContext;
pub use error::{Result, TenantError};
pub use events::{
    ConsoleDispatcher, ConsoleEvent, Dispatcher, EventBus, ListenerId, TenantEvent, Unresolved,
};
pub use extractor::{IdentifierSource, TenantExtractor, TenantOption};
pub use middleware::TenantableState;
pub use resolver::{Invocation, ResolutionState, Resolver};

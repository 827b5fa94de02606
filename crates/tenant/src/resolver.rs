//! Tenant resolver
//!
//! Finds the tenant owning the current invocation and switches its
//! connection context:
//!
//! ```text
//!   Unresolved ──resolve──▶ Resolving ──hit──▶ Resolved
//!                               │                 │
//!                               └──miss──▶ NotResolved
//!                                                 │
//!   Resolved ──next bulk iteration──▶ Resolving ◀─┘ (never: terminal)
//! ```
//!
//! Lookup order for a console `--tenant` value: tenant domain, uuid, id,
//! then alias domain. A request host only tries tenant domain, then alias
//! domain. The first hit wins.

use crate::context::TenantContext;
use crate::error::Result;
use crate::events::{ConsoleDispatcher, EventBus, TenantEvent, Unresolved};
use crate::extractor::{IdentifierSource, TenantExtractor, TenantOption};
use std::sync::{Arc, OnceLock};
use tenantable_database::{CredentialCodec, EncryptedAttributes, TenantDirectory};
use tenantable_models::Tenant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved,
    NotResolved,
}

/// What triggered resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Request { host: String },
    Console { tenant: Option<TenantOption> },
}

impl Invocation {
    /// From a raw Host header value
    pub fn request(host_header: &str) -> Self {
        Self::Request {
            host: TenantExtractor::host_from_header(host_header),
        }
    }

    /// From raw console argv
    pub fn console<S: AsRef<str>>(args: &[S]) -> Self {
        Self::Console {
            tenant: TenantExtractor::tenant_option(args),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupStep {
    Domain,
    Uuid,
    Id,
    Alias,
}

const CONSOLE_LOOKUP: [LookupStep; 4] = [
    LookupStep::Domain,
    LookupStep::Uuid,
    LookupStep::Id,
    LookupStep::Alias,
];

// A hostname is never treated as an id or uuid
const REQUEST_LOOKUP: [LookupStep; 2] = [LookupStep::Domain, LookupStep::Alias];

pub struct Resolver {
    directory: Arc<dyn TenantDirectory>,
    codec: Arc<CredentialCodec>,
    events: EventBus,
    context: TenantContext,
    state: ResolutionState,
    console_dispatcher: OnceLock<ConsoleDispatcher>,
}

impl Resolver {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        codec: Arc<CredentialCodec>,
        context: TenantContext,
    ) -> Self {
        Self {
            directory,
            codec,
            events: EventBus::new(),
            context,
            state: ResolutionState::Unresolved,
            console_dispatcher: OnceLock::new(),
        }
    }

    /// Publish to an existing bus (shared listeners) instead of a private one
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn directory(&self) -> &Arc<dyn TenantDirectory> {
        &self.directory
    }

    pub fn codec(&self) -> &Arc<CredentialCodec> {
        &self.codec
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    pub fn context(&self) -> &TenantContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TenantContext {
        &mut self.context
    }

    pub fn into_context(self) -> TenantContext {
        self.context
    }

    pub fn active_tenant(&self) -> Option<&Tenant> {
        self.context.tenant()
    }

    pub fn is_resolved(&self) -> bool {
        self.context.is_resolved()
    }

    /// Console dispatcher, created on first use and kept for this resolver
    pub fn console_dispatcher(&self) -> &ConsoleDispatcher {
        self.console_dispatcher.get_or_init(ConsoleDispatcher::new)
    }

    /// Entry point. A miss is not an error: it fires `TenantNotResolved`
    /// and leaves the host application to decide what to do.
    pub async fn resolve_tenant(&mut self, invocation: &Invocation) -> Result<ResolutionState> {
        self.context.connections_mut().remember_original();

        match invocation {
            Invocation::Console { tenant } => {
                // The start/terminate hooks publish through this dispatcher
                self.console_dispatcher();

                match tenant {
                    None => {
                        tracing::debug!("No --tenant given, skipping resolution");
                    }
                    Some(TenantOption::All) => {
                        tracing::debug!("--tenant=all, deferring to per-tenant runs");
                    }
                    Some(TenantOption::Single(value)) => {
                        self.resolve(value, IdentifierSource::Console, &CONSOLE_LOOKUP)
                            .await?;
                    }
                }
            }
            Invocation::Request { host } => {
                self.resolve(host, IdentifierSource::Host, &REQUEST_LOOKUP).await?;
            }
        }

        Ok(self.state)
    }

    /// Make `tenant` the active tenant: switch the connection, store it,
    /// point the base URL at its domain, then fire `SetActiveTenant`.
    /// On error the previous tenant and connection stay in place.
    pub fn set_active_tenant(&mut self, tenant: Tenant) -> Result<()> {
        // Fails before touching the context when the credentials do not decrypt
        self.activate_tenant_connection(&tenant)?;
        self.context.set_tenant(tenant.clone());
        self.context.set_app_url(tenant.domain.clone());
        self.state = ResolutionState::Resolved;

        tracing::info!(
            tenant_id = tenant.id,
            uuid = %tenant.uuid,
            domain = %tenant.domain,
            "Active tenant set"
        );

        self.events.emit(&TenantEvent::SetActiveTenant(tenant));
        Ok(())
    }

    /// Rebuild the `tenant` connection from the tenant's decrypted
    /// credentials and make it the default.
    pub fn activate_tenant_connection(&mut self, tenant: &Tenant) -> Result<()> {
        let credentials = tenant.credentials(&self.codec)?;
        self.context.connections_mut().activate_tenant(&credentials);
        Ok(())
    }

    /// Leave tenant context: restore the originally recorded default
    pub fn purge_tenant_connection(&mut self) {
        self.context.connections_mut().restore_original();
    }

    /// Re-enter tenant context without rebuilding the profile
    pub fn reconnect_tenant_connection(&mut self) {
        self.context.connections_mut().reconnect_tenant();
    }

    async fn resolve(
        &mut self,
        identifier: &str,
        source: IdentifierSource,
        steps: &[LookupStep],
    ) -> Result<()> {
        self.state = ResolutionState::Resolving;

        let found = match self.lookup(identifier, steps).await {
            Ok(found) => found,
            Err(e) => {
                self.state = ResolutionState::Unresolved;
                return Err(e);
            }
        };

        match found {
            Some((step, tenant)) => {
                tracing::info!(
                    identifier,
                    matched_by = ?step,
                    tenant_id = tenant.id,
                    "Tenant resolved"
                );
                if let Err(e) = self.set_active_tenant(tenant.clone()) {
                    self.state = ResolutionState::Unresolved;
                    return Err(e);
                }
                self.events.emit(&TenantEvent::TenantResolved(tenant));
            }
            None => {
                tracing::warn!(identifier, source = ?source, "Tenant not resolved");
                self.state = ResolutionState::NotResolved;
                self.events.emit(&TenantEvent::TenantNotResolved(Unresolved {
                    identifier: identifier.to_string(),
                    source,
                }));
            }
        }

        Ok(())
    }

    async fn lookup(
        &self,
        identifier: &str,
        steps: &[LookupStep],
    ) -> Result<Option<(LookupStep, Tenant)>> {
        for step in steps {
            tracing::debug!(identifier, step = ?step, "Tenant lookup");

            let hit = match step {
                LookupStep::Domain => self.directory.find_tenant_by_domain(identifier).await?,
                LookupStep::Uuid => self.directory.find_tenant_by_uuid(identifier).await?,
                LookupStep::Id => match identifier.parse::<i64>() {
                    Ok(id) => self.directory.find_tenant_by_id(id).await?,
                    Err(_) => None,
                },
                LookupStep::Alias => self
                    .directory
                    .find_domain_alias(identifier)
                    .await?
                    .map(|(_, tenant)| tenant),
            };

            if let Some(tenant) = hit {
                return Ok(Some((*step, tenant)));
            }
        }

        Ok(None)
    }
}

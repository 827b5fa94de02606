// Per-invocation tenant context
// One instance per request or console run; never shared between requests.

use crate::config::TenantableConfig;
use crate::connection::ConnectionRegistry;
use tenantable_models::Tenant;

#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant: Option<Tenant>,
    connections: ConnectionRegistry,
    app_url: Option<String>,
}

impl TenantContext {
    pub fn new(connections: ConnectionRegistry, app_url: Option<String>) -> Self {
        Self {
            tenant: None,
            connections,
            app_url,
        }
    }

    pub fn from_config(config: &TenantableConfig) -> Self {
        Self::new(
            ConnectionRegistry::new(config.default_connection.clone(), config.connections.clone()),
            config.app_url.clone(),
        )
    }

    /// Active tenant, if one has been resolved
    pub fn tenant(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.tenant.is_some()
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut ConnectionRegistry {
        &mut self.connections
    }

    /// Effective base URL (`app.url`)
    pub fn app_url(&self) -> Option<&str> {
        self.app_url.as_deref()
    }

    pub(crate) fn set_tenant(&mut self, tenant: Tenant) {
        self.tenant = Some(tenant);
    }

    pub(crate) fn set_app_url(&mut self, url: String) {
        self.app_url = Some(url);
    }
}

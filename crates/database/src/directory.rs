//! Tenant directory
//!
//! Read-only lookups the resolver runs against the `tenants` and
//! `tenant_domains` tables. Each lookup returns the first match or `None`;
//! uniqueness of domains and uuids is a data invariant, so there is nothing
//! to disambiguate.

use crate::crypto::CredentialCodec;
use crate::error::Result;
use crate::repositories::{domains::DomainRepository, tenants::TenantRepository};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tenantable_models::{Domain, Tenant};

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant_by_domain(&self, host: &str) -> Result<Option<Tenant>>;

    async fn find_tenant_by_id(&self, id: i64) -> Result<Option<Tenant>>;

    async fn find_tenant_by_uuid(&self, uuid: &str) -> Result<Option<Tenant>>;

    /// Alias record for `host` together with the tenant that owns it.
    async fn find_domain_alias(&self, host: &str) -> Result<Option<(Domain, Tenant)>>;

    /// Every tenant, in enumeration (id) order.
    async fn all_tenants(&self) -> Result<Vec<Tenant>>;
}

/// Directory backed by the landlord Postgres database.
pub struct PgTenantDirectory {
    tenants: TenantRepository,
    domains: DomainRepository,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool, codec: Arc<CredentialCodec>) -> Self {
        Self {
            tenants: TenantRepository::new(pool.clone(), codec),
            domains: DomainRepository::new(pool),
        }
    }

    pub fn tenants(&self) -> &TenantRepository {
        &self.tenants
    }

    pub fn domains(&self) -> &DomainRepository {
        &self.domains
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find_tenant_by_domain(&self, host: &str) -> Result<Option<Tenant>> {
        self.tenants.find_by_domain(host).await
    }

    async fn find_tenant_by_id(&self, id: i64) -> Result<Option<Tenant>> {
        self.tenants.find_by_id(id).await
    }

    async fn find_tenant_by_uuid(&self, uuid: &str) -> Result<Option<Tenant>> {
        self.tenants.find_by_uuid(uuid).await
    }

    async fn find_domain_alias(&self, host: &str) -> Result<Option<(Domain, Tenant)>> {
        let Some(alias) = self.domains.find_by_domain(host).await? else {
            return Ok(None);
        };

        // The foreign key cascades, so a dangling alias only shows up mid-delete
        Ok(self
            .tenants
            .find_by_id(alias.tenant_id)
            .await?
            .map(|tenant| (alias, tenant)))
    }

    async fn all_tenants(&self) -> Result<Vec<Tenant>> {
        self.tenants.list_all().await
    }
}

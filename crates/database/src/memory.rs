//! In-memory tenant directory
//!
//! Same creation rules as the Postgres repositories (generated uuids,
//! encoded credentials, unique domains, cascading deletes) without a
//! database. Used by tests and by hosts that keep their tenant list in
//! configuration.

use crate::crypto::CredentialCodec;
use crate::directory::TenantDirectory;
use crate::error::{DatabaseError, Result};
use crate::identifier::IdentifierGenerator;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tenantable_models::{CredentialField, Domain, NewDomain, NewTenant, Tenant, UpdateTenant};
use tokio::sync::RwLock;
use validator::Validate;

#[derive(Default)]
struct DirectoryState {
    tenants: Vec<Tenant>,
    domains: Vec<Domain>,
    next_tenant_id: i64,
    next_domain_id: i64,
}

pub struct InMemoryTenantDirectory {
    codec: Arc<CredentialCodec>,
    state: RwLock<DirectoryState>,
}

impl Default for InMemoryTenantDirectory {
    fn default() -> Self {
        Self::new(Arc::new(CredentialCodec::disabled()))
    }
}

impl InMemoryTenantDirectory {
    pub fn new(codec: Arc<CredentialCodec>) -> Self {
        Self {
            codec,
            state: RwLock::new(DirectoryState {
                next_tenant_id: 1,
                next_domain_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn codec(&self) -> &Arc<CredentialCodec> {
        &self.codec
    }

    pub async fn create_tenant(&self, request: &NewTenant) -> Result<Tenant> {
        request.validate()?;

        let mut state = self.state.write().await;

        if state.tenants.iter().any(|t| t.domain == request.domain) {
            return Err(DatabaseError::duplicate(
                "Tenant",
                &format!("domain {}", request.domain),
            ));
        }

        let existing: HashSet<String> = state.tenants.iter().map(|t| t.uuid.clone()).collect();
        let uuid = IdentifierGenerator::generate_unique(&existing);

        let now = Utc::now();
        let tenant = Tenant {
            id: state.next_tenant_id,
            uuid,
            name: request.name.clone(),
            slug: request.slug.clone(),
            domain: request.domain.clone(),
            driver: request.driver.clone(),
            host: self.codec.encode(CredentialField::Host, &request.host)?,
            database: self.codec.encode(CredentialField::Database, &request.database)?,
            username: self.codec.encode(CredentialField::Username, &request.username)?,
            password: self.codec.encode(CredentialField::Password, &request.password)?,
            prefix: request.prefix.clone(),
            meta: request.meta.clone(),
            created_at: now,
            updated_at: now,
        };

        state.next_tenant_id += 1;
        state.tenants.push(tenant.clone());

        Ok(tenant)
    }

    /// Partial update; a uuid in the request is discarded.
    pub async fn update_tenant(&self, id: i64, request: &UpdateTenant) -> Result<Tenant> {
        request.validate()?;

        let mut state = self.state.write().await;

        if let Some(domain) = &request.domain {
            if state.tenants.iter().any(|t| t.id != id && &t.domain == domain) {
                return Err(DatabaseError::duplicate("Tenant", &format!("domain {}", domain)));
            }
        }

        let tenant = state
            .tenants
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| DatabaseError::not_found("Tenant", &id.to_string()))?;

        if let Some(name) = &request.name {
            tenant.name = name.clone();
        }
        if let Some(slug) = &request.slug {
            tenant.slug = slug.clone();
        }
        if let Some(domain) = &request.domain {
            tenant.domain = domain.clone();
        }
        if let Some(driver) = &request.driver {
            tenant.driver = driver.clone();
        }
        if let Some(host) = &request.host {
            tenant.host = self.codec.encode(CredentialField::Host, host)?;
        }
        if let Some(database) = &request.database {
            tenant.database = self.codec.encode(CredentialField::Database, database)?;
        }
        if let Some(username) = &request.username {
            tenant.username = self.codec.encode(CredentialField::Username, username)?;
        }
        if let Some(password) = &request.password {
            tenant.password = self.codec.encode(CredentialField::Password, password)?;
        }
        if let Some(prefix) = &request.prefix {
            tenant.prefix = prefix.clone();
        }
        if let Some(meta) = &request.meta {
            tenant.meta = meta.clone();
        }
        tenant.updated_at = Utc::now();

        Ok(tenant.clone())
    }

    /// Remove a tenant and every alias pointing at it.
    pub async fn delete_tenant(&self, id: i64) -> Result<()> {
        let mut state = self.state.write().await;

        let before = state.tenants.len();
        state.tenants.retain(|t| t.id != id);
        if state.tenants.len() == before {
            return Err(DatabaseError::not_found("Tenant", &id.to_string()));
        }

        state.domains.retain(|d| d.tenant_id != id);
        Ok(())
    }

    pub async fn add_domain(&self, request: &NewDomain) -> Result<Domain> {
        request.validate()?;

        let mut state = self.state.write().await;

        if !state.tenants.iter().any(|t| t.id == request.tenant_id) {
            return Err(DatabaseError::not_found("Tenant", &request.tenant_id.to_string()));
        }
        if state.domains.iter().any(|d| d.domain == request.domain) {
            return Err(DatabaseError::duplicate("Domain", &request.domain));
        }

        let now = Utc::now();
        let domain = Domain {
            id: state.next_domain_id,
            tenant_id: request.tenant_id,
            domain: request.domain.clone(),
            meta: request.meta.clone(),
            created_at: now,
            updated_at: now,
        };

        state.next_domain_id += 1;
        state.domains.push(domain.clone());

        Ok(domain)
    }

    pub async fn domains_for(&self, tenant_id: i64) -> Vec<Domain> {
        self.state
            .read()
            .await
            .domains
            .iter()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_tenant_by_domain(&self, host: &str) -> Result<Option<Tenant>> {
        let state = self.state.read().await;
        Ok(state.tenants.iter().find(|t| t.domain == host).cloned())
    }

    async fn find_tenant_by_id(&self, id: i64) -> Result<Option<Tenant>> {
        let state = self.state.read().await;
        Ok(state.tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn find_tenant_by_uuid(&self, uuid: &str) -> Result<Option<Tenant>> {
        let state = self.state.read().await;
        Ok(state.tenants.iter().find(|t| t.uuid == uuid).cloned())
    }

    async fn find_domain_alias(&self, host: &str) -> Result<Option<(Domain, Tenant)>> {
        let state = self.state.read().await;
        let Some(alias) = state.domains.iter().find(|d| d.domain == host) else {
            return Ok(None);
        };

        Ok(state
            .tenants
            .iter()
            .find(|t| t.id == alias.tenant_id)
            .map(|tenant| (alias.clone(), tenant.clone())))
    }

    async fn all_tenants(&self) -> Result<Vec<Tenant>> {
        Ok(self.state.read().await.tenants.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptedAttributes;
    use base64::{engine::general_purpose::STANDARD, Engine};

    fn new_tenant(domain: &str) -> NewTenant {
        NewTenant {
            name: domain.to_string(),
            slug: domain.replace('.', "-"),
            domain: domain.to_string(),
            driver: "pgsql".to_string(),
            host: "db.internal".to_string(),
            database: "app".to_string(),
            username: "app".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_unique_uuids() {
        let directory = InMemoryTenantDirectory::default();
        let mut seen = HashSet::new();

        for i in 0..50 {
            let tenant = directory
                .create_tenant(&new_tenant(&format!("t{}.example.com", i)))
                .await
                .unwrap();
            assert!(IdentifierGenerator::is_valid(&tenant.uuid));
            assert!(seen.insert(tenant.uuid.clone()));
            assert_eq!(tenant.id, i + 1);
        }
    }

    #[tokio::test]
    async fn test_supplied_uuid_is_ignored() {
        let directory = InMemoryTenantDirectory::default();
        let tenant = directory
            .create_tenant(&NewTenant {
                uuid: Some("fixed000".to_string()),
                ..new_tenant("a.example.com")
            })
            .await
            .unwrap();
        assert_ne!(tenant.uuid, "fixed000");

        let updated = directory
            .update_tenant(
                tenant.id,
                &UpdateTenant {
                    uuid: Some("other000".to_string()),
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.uuid, tenant.uuid);
        assert_eq!(updated.name, "Renamed");
    }

    #[tokio::test]
    async fn test_duplicate_domain_rejected() {
        let directory = InMemoryTenantDirectory::default();
        directory.create_tenant(&new_tenant("a.example.com")).await.unwrap();
        let err = directory
            .create_tenant(&new_tenant("a.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEntry(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_aliases() {
        let directory = InMemoryTenantDirectory::default();
        let tenant = directory.create_tenant(&new_tenant("a.example.com")).await.unwrap();
        directory
            .add_domain(&NewDomain {
                tenant_id: tenant.id,
                domain: "alias.example.com".to_string(),
                meta: serde_json::Value::Null,
            })
            .await
            .unwrap();

        assert!(directory.find_domain_alias("alias.example.com").await.unwrap().is_some());

        directory.delete_tenant(tenant.id).await.unwrap();
        assert!(directory.find_domain_alias("alias.example.com").await.unwrap().is_none());
        assert!(directory.domains_for(tenant.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_alias_requires_existing_tenant() {
        let directory = InMemoryTenantDirectory::default();
        let err = directory
            .add_domain(&NewDomain {
                tenant_id: 9,
                domain: "alias.example.com".to_string(),
                meta: serde_json::Value::Null,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_credentials_encrypted_at_rest() {
        let codec = Arc::new(CredentialCodec::with_key(&STANDARD.encode([0x11u8; 32])).unwrap());
        let directory = InMemoryTenantDirectory::new(codec.clone());

        let tenant = directory.create_tenant(&new_tenant("a.example.com")).await.unwrap();
        assert_ne!(tenant.password, "secret");
        assert_ne!(tenant.host, "db.internal");

        let creds = tenant.credentials(&codec).unwrap();
        assert_eq!(creds.host, "db.internal");
        assert_eq!(creds.password, "secret");
        assert_eq!(tenant.username(&codec).unwrap(), "app");
    }
}

use crate::crypto::CredentialCodec;
use crate::error::{DatabaseError, Result};
use crate::identifier::IdentifierGenerator;
use std::collections::HashSet;
use std::sync::Arc;
use sqlx::PgPool;
use tenantable_models::{CredentialField, NewTenant, Tenant, UpdateTenant};
use validator::Validate;

pub struct TenantRepository {
    pool: PgPool,
    codec: Arc<CredentialCodec>,
}

impl TenantRepository {
    pub fn new(pool: PgPool, codec: Arc<CredentialCodec>) -> Self {
        Self { pool, codec }
    }

    /// Create a tenant. The uuid is generated here, checked against every
    /// uuid present when the transaction starts, and credentials are
    /// encoded before insert.
    pub async fn create(&self, request: &NewTenant) -> Result<Tenant> {
        request.validate()?;

        if request.uuid.is_some() {
            tracing::debug!("Ignoring caller-supplied uuid for tenant {}", request.domain);
        }

        let mut tx = self.pool.begin().await?;

        let existing: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT uuid FROM tenants")
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();
        let uuid = IdentifierGenerator::generate_unique(&existing);

        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (uuid, name, slug, domain, driver, host, database, username, password, prefix, meta)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&uuid)
        .bind(&request.name)
        .bind(&request.slug)
        .bind(&request.domain)
        .bind(&request.driver)
        .bind(self.codec.encode(CredentialField::Host, &request.host)?)
        .bind(self.codec.encode(CredentialField::Database, &request.database)?)
        .bind(self.codec.encode(CredentialField::Username, &request.username)?)
        .bind(self.codec.encode(CredentialField::Password, &request.password)?)
        .bind(&request.prefix)
        .bind(sqlx::types::Json(&request.meta))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "Tenant", &format!("domain {}", request.domain)))?;

        tx.commit().await?;

        tracing::info!("Created tenant {} ({}) uuid={}", tenant.name, tenant.domain, tenant.uuid);

        Ok(tenant)
    }

    /// Find tenant by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Find tenant by uuid
    pub async fn find_by_uuid(&self, uuid: &str) -> Result<Option<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE uuid = $1")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Find tenant by primary domain
    pub async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE domain = $1")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Get tenant by ID, failing when it does not exist
    pub async fn get(&self, id: i64) -> Result<Tenant> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Tenant", &id.to_string()))
    }

    /// All tenants in id order
    pub async fn list_all(&self) -> Result<Vec<Tenant>> {
        Ok(sqlx::query_as::<_, Tenant>("SELECT * FROM tenants ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    /// Update tenant (partial update). A uuid in the request is discarded.
    pub async fn update(&self, id: i64, request: &UpdateTenant) -> Result<Tenant> {
        request.validate()?;

        let current = self.get(id).await?;

        if request.uuid.is_some() {
            tracing::debug!("Ignoring uuid change for tenant {}", current.uuid);
        }

        let name = request.name.as_ref().unwrap_or(&current.name);
        let slug = request.slug.as_ref().unwrap_or(&current.slug);
        let domain = request.domain.as_ref().unwrap_or(&current.domain);
        let driver = request.driver.as_ref().unwrap_or(&current.driver);
        let prefix = request.prefix.as_ref().unwrap_or(&current.prefix);
        let meta = request.meta.as_ref().unwrap_or(&current.meta);

        let host = self.encode_or_keep(CredentialField::Host, request.host.as_deref(), &current.host)?;
        let database = self.encode_or_keep(
            CredentialField::Database,
            request.database.as_deref(),
            &current.database,
        )?;
        let username = self.encode_or_keep(
            CredentialField::Username,
            request.username.as_deref(),
            &current.username,
        )?;
        let password = self.encode_or_keep(
            CredentialField::Password,
            request.password.as_deref(),
            &current.password,
        )?;

        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            UPDATE tenants
            SET name = $1, slug = $2, domain = $3, driver = $4,
                host = $5, database = $6, username = $7, password = $8,
                prefix = $9, meta = $10, updated_at = NOW()
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(domain)
        .bind(driver)
        .bind(host)
        .bind(database)
        .bind(username)
        .bind(password)
        .bind(prefix)
        .bind(sqlx::types::Json(meta))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "Tenant", &format!("domain {}", domain)))?;

        Ok(tenant)
    }

    /// Delete tenant (cascade deletes its domain aliases)
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Tenant", &id.to_string()));
        }

        tracing::info!("Deleted tenant {}", id);
        Ok(())
    }

    fn encode_or_keep(
        &self,
        field: CredentialField,
        plaintext: Option<&str>,
        stored: &str,
    ) -> Result<String> {
        match plaintext {
            Some(value) => self.codec.encode(field, value),
            None => Ok(stored.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DatabaseConfig};

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_create_assigns_uuid() {
        let db = Database::new(DatabaseConfig::from_env()).await.unwrap();
        db.migrate().await.unwrap();
        let repo = TenantRepository::new(db.pool().clone(), Arc::new(CredentialCodec::disabled()));

        let domain = format!("{}.test.local", IdentifierGenerator::generate());
        let tenant = repo
            .create(&NewTenant {
                name: "Test".to_string(),
                slug: "test".to_string(),
                domain: domain.clone(),
                driver: "pgsql".to_string(),
                uuid: Some("zzzzzzzz".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(IdentifierGenerator::is_valid(&tenant.uuid));
        assert_ne!(tenant.uuid, "zzzzzzzz");
        assert_eq!(repo.find_by_domain(&domain).await.unwrap(), Some(tenant.clone()));

        repo.delete(tenant.id).await.unwrap();
    }
}

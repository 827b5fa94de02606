use crate::error::{DatabaseError, Result};
use sqlx::PgPool;
use tenantable_models::{Domain, NewDomain};
use validator::Validate;

pub struct DomainRepository {
    pool: PgPool,
}

impl DomainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bind a secondary hostname to a tenant
    pub async fn create(&self, request: &NewDomain) -> Result<Domain> {
        request.validate()?;

        let domain = sqlx::query_as::<_, Domain>(
            r#"
            INSERT INTO tenant_domains (tenant_id, domain, meta)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.tenant_id)
        .bind(&request.domain)
        .bind(sqlx::types::Json(&request.meta))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "Domain", &request.domain))?;

        tracing::info!("Added domain {} for tenant {}", domain.domain, domain.tenant_id);

        Ok(domain)
    }

    /// Find alias by hostname
    pub async fn find_by_domain(&self, domain: &str) -> Result<Option<Domain>> {
        Ok(
            sqlx::query_as::<_, Domain>("SELECT * FROM tenant_domains WHERE domain = $1")
                .bind(domain)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn list_for_tenant(&self, tenant_id: i64) -> Result<Vec<Domain>> {
        Ok(sqlx::query_as::<_, Domain>(
            "SELECT * FROM tenant_domains WHERE tenant_id = $1 ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Domain>> {
        Ok(sqlx::query_as::<_, Domain>("SELECT * FROM tenant_domains ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    /// Remove an alias by hostname
    pub async fn delete_by_domain(&self, domain: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tenant_domains WHERE domain = $1")
            .bind(domain)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Domain", domain));
        }

        Ok(())
    }
}

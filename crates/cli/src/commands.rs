use anyhow::Context;
use async_trait::async_trait;
use clap::{Args, Subcommand};
use std::sync::Arc;
use tenantable::{ConsoleCommand, ConsoleInput, ConsoleOutput, TenantContext};
use tenantable_database::{CredentialCodec, Database, EncryptedAttributes, PgTenantDirectory};
use tenantable_models::{NewDomain, NewTenant, UpdateTenant};

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the tenants and tenant_domains tables
    Migrate,

    #[command(name = "tenants:list")]
    TenantsList,

    #[command(name = "tenants:create")]
    TenantsCreate(CreateTenantArgs),

    #[command(name = "tenants:show")]
    TenantsShow { id: i64 },

    #[command(name = "tenants:update")]
    TenantsUpdate(UpdateTenantArgs),

    /// Delete a tenant and its domain aliases
    #[command(name = "tenants:delete")]
    TenantsDelete { id: i64 },

    /// Route an extra hostname to an existing tenant
    #[command(name = "domains:add")]
    DomainsAdd { tenant_id: i64, domain: String },

    #[command(name = "domains:list")]
    DomainsList {
        #[arg(long)]
        tenant_id: Option<i64>,
    },

    #[command(name = "domains:remove")]
    DomainsRemove { domain: String },

    /// Print a fresh credential encryption key
    #[command(name = "key:generate")]
    KeyGenerate,

    /// Show the tenant and connection the command runs against
    #[command(name = "tenant:current")]
    TenantCurrent {
        /// Also open the tenant connection and run a query
        #[arg(long)]
        ping: bool,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Migrate => "migrate",
            Self::TenantsList => "tenants:list",
            Self::TenantsCreate(_) => "tenants:create",
            Self::TenantsShow { .. } => "tenants:show",
            Self::TenantsUpdate(_) => "tenants:update",
            Self::TenantsDelete { .. } => "tenants:delete",
            Self::DomainsAdd { .. } => "domains:add",
            Self::DomainsList { .. } => "domains:list",
            Self::DomainsRemove { .. } => "domains:remove",
            Self::KeyGenerate => "key:generate",
            Self::TenantCurrent { .. } => "tenant:current",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct CreateTenantArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub domain: String,

    /// Defaults to the domain with dots replaced by dashes
    #[arg(long)]
    pub slug: Option<String>,

    #[arg(long, default_value = "pgsql")]
    pub driver: String,

    #[arg(long, default_value = "")]
    pub host: String,

    #[arg(long, default_value = "")]
    pub database: String,

    #[arg(long, default_value = "")]
    pub username: String,

    #[arg(long, env = "TENANT_DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Table prefix, without the trailing underscore
    #[arg(long, default_value = "")]
    pub prefix: String,
}

impl From<&CreateTenantArgs> for NewTenant {
    fn from(args: &CreateTenantArgs) -> Self {
        NewTenant {
            name: args.name.clone(),
            slug: args
                .slug
                .clone()
                .unwrap_or_else(|| args.domain.replace('.', "-")),
            domain: args.domain.to_lowercase(),
            driver: args.driver.clone(),
            host: args.host.clone(),
            database: args.database.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            prefix: args.prefix.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct UpdateTenantArgs {
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub domain: Option<String>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub database: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    #[arg(long)]
    pub prefix: Option<String>,
}

impl From<&UpdateTenantArgs> for UpdateTenant {
    fn from(args: &UpdateTenantArgs) -> Self {
        UpdateTenant {
            name: args.name.clone(),
            domain: args.domain.as_deref().map(str::to_lowercase),
            host: args.host.clone(),
            database: args.database.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            prefix: args.prefix.clone(),
            ..Default::default()
        }
    }
}

pub fn key_line() -> String {
    format!("TENANTABLE_ENCRYPTION_KEY={}", CredentialCodec::generate_key())
}

/// A parsed subcommand bound to the landlord database
pub struct CliCommand {
    command: Command,
    database: Database,
    directory: Arc<PgTenantDirectory>,
    codec: Arc<CredentialCodec>,
}

impl CliCommand {
    pub fn new(
        command: Command,
        database: Database,
        directory: Arc<PgTenantDirectory>,
        codec: Arc<CredentialCodec>,
    ) -> Self {
        Self {
            command,
            database,
            directory,
            codec,
        }
    }

    async fn tenant_current(
        &self,
        ping: bool,
        output: &mut dyn ConsoleOutput,
        context: &mut TenantContext,
    ) -> anyhow::Result<()> {
        let Some(tenant) = context.tenant().cloned() else {
            output.info("No tenant context");
            return Ok(());
        };

        output.info(&format!("Tenant {} ({}) {}", tenant.id, tenant.uuid, tenant.domain));
        if let Some(url) = context.app_url() {
            output.info(&format!("App URL {}", url));
        }

        let connection = context.connections().default_connection().to_string();
        if let Some(profile) = context.connections().default_profile() {
            output.info(&format!(
                "Connection [{}] {}@{}/{} prefix '{}'",
                connection, profile.username, profile.host, profile.database, profile.prefix
            ));
        }

        if ping {
            let pool = context.connections_mut().default_pool()?;
            sqlx::query("SELECT 1")
                .execute(&pool)
                .await
                .with_context(|| format!("Tenant database for {} unreachable", tenant.domain))?;
            output.info("Tenant database reachable");
        }

        Ok(())
    }
}

#[async_trait]
impl ConsoleCommand for CliCommand {
    fn name(&self) -> &str {
        self.command.name()
    }

    async fn run(
        &mut self,
        _input: &ConsoleInput,
        output: &mut dyn ConsoleOutput,
        context: &mut TenantContext,
    ) -> anyhow::Result<i32> {
        let tenants = self.directory.tenants();
        let domains = self.directory.domains();

        match &self.command {
            Command::Migrate => {
                self.database.migrate().await?;
                output.info("Tenant tables migrated");
            }
            Command::TenantsList => {
                let all = tenants.list_all().await?;
                if all.is_empty() {
                    output.info("No tenants");
                }
                for tenant in all {
                    output.info(&format!(
                        "{:>5}  {}  {}  {}",
                        tenant.id, tenant.uuid, tenant.domain, tenant.name
                    ));
                }
            }
            Command::TenantsCreate(args) => {
                let tenant = tenants.create(&NewTenant::from(args)).await?;
                output.info(&format!(
                    "Created tenant {} ({}) for {}",
                    tenant.id, tenant.uuid, tenant.domain
                ));
            }
            Command::TenantsShow { id } => {
                let tenant = tenants.get(*id).await?;
                let credentials = tenant.credentials(&self.codec)?;
                output.info(&format!("id:       {}", tenant.id));
                output.info(&format!("uuid:     {}", tenant.uuid));
                output.info(&format!("name:     {}", tenant.name));
                output.info(&format!("domain:   {}", tenant.domain));
                output.info(&format!("driver:   {}", credentials.driver));
                output.info(&format!("host:     {}", credentials.host));
                output.info(&format!("database: {}", credentials.database));
                output.info(&format!("username: {}", credentials.username));
                output.info(&format!("prefix:   {}", credentials.prefix));
                for alias in domains.list_for_tenant(tenant.id).await? {
                    output.info(&format!("alias:    {}", alias.domain));
                }
            }
            Command::TenantsUpdate(args) => {
                let tenant = tenants.update(args.id, &UpdateTenant::from(args)).await?;
                output.info(&format!("Updated tenant {} ({})", tenant.id, tenant.domain));
            }
            Command::TenantsDelete { id } => {
                tenants.delete(*id).await?;
                output.info(&format!("Deleted tenant {}", id));
            }
            Command::DomainsAdd { tenant_id, domain } => {
                let alias = domains
                    .create(&NewDomain {
                        tenant_id: *tenant_id,
                        domain: domain.to_lowercase(),
                        meta: serde_json::Value::Null,
                    })
                    .await?;
                output.info(&format!("Added {} to tenant {}", alias.domain, alias.tenant_id));
            }
            Command::DomainsList { tenant_id } => {
                let all = match tenant_id {
                    Some(id) => domains.list_for_tenant(*id).await?,
                    None => domains.list_all().await?,
                };
                for alias in all {
                    output.info(&format!("{:>5}  {}", alias.tenant_id, alias.domain));
                }
            }
            Command::DomainsRemove { domain } => {
                domains.delete_by_domain(domain).await?;
                output.info(&format!("Removed {}", domain));
            }
            Command::KeyGenerate => output.info(&key_line()),
            Command::TenantCurrent { ping } => {
                self.tenant_current(*ping, output, context).await?;
            }
        }

        Ok(0)
    }
}

mod commands;

use clap::Parser;
use commands::{CliCommand, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tenantable::{boot, ConsoleInput, Resolver, StdConsole, TenantContext, TenantableConfig};
use tenantable_database::{CredentialCodec, Database};

/// Tenant directory administration with per-tenant command runs
#[derive(Parser)]
#[command(name = "tenantable", about = "Multi-tenant resolver and tenant directory tool")]
struct Cli {
    /// YAML configuration file; environment variables are used when absent
    #[arg(short, long, env = "TENANTABLE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Tenant id, uuid or domain to run against; `*` or `all` runs once per tenant
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "")]
    tenant: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenantable=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    if let Command::KeyGenerate = cli.command {
        println!("{}", commands::key_line());
        return Ok(0);
    }

    let config = match &cli.config {
        Some(path) => TenantableConfig::load(path)?,
        None => TenantableConfig::from_env(),
    };

    let codec = Arc::new(CredentialCodec::new(&config.encryption)?);
    let database = Database::new(config.database_config()).await?;
    let directory = Arc::new(database.directory(codec.clone()));

    tracing::debug!(
        "Landlord connection [{}], credential encryption {}",
        config.default_connection,
        if codec.is_enabled() { "on" } else { "off" }
    );

    // Resolution reads `--tenant` straight from argv, before clap binding
    let input = ConsoleInput::from_env();
    let mut resolver = Resolver::new(directory.clone(), codec.clone(), TenantContext::from_config(&config));
    boot(&mut resolver, &input.invocation()).await?;

    let mut command = CliCommand::new(cli.command, database.clone(), directory, codec);
    let code = resolver
        .run_console_command(&mut command, &input, &mut StdConsole)
        .await?;

    database.close().await;
    Ok(code)
}

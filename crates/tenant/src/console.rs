//! Console command lifecycle
//!
//! A command runs through `on_command_start`, its own `run` (unless the
//! start hook refused or deferred it) and `on_command_terminate`, which
//! re-runs the command once per tenant when `--tenant` is `*` or `all`.

use crate::context::TenantContext;
use crate::error::{Result, TenantError};
use crate::events::ConsoleEvent;
use crate::extractor::{TenantExtractor, TenantOption};
use crate::resolver::{Invocation, Resolver};
use async_trait::async_trait;

/// Exit code of a command the start hook refused or deferred to the bulk loop
pub const DISABLED_EXIT_CODE: i32 = 113;

/// Line-oriented console writer
pub trait ConsoleOutput: Send {
    fn info(&mut self, line: &str);

    fn error(&mut self, line: &str);
}

/// Writes info lines to stdout and errors to stderr
#[derive(Debug, Default)]
pub struct StdConsole;

impl ConsoleOutput for StdConsole {
    fn info(&mut self, line: &str) {
        println!("{}", line);
    }

    fn error(&mut self, line: &str) {
        eprintln!("{}", line);
    }
}

/// Raw console argv, readable before any argument binding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleInput {
    args: Vec<String>,
}

impl ConsoleInput {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::args())
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn parameter_option(&self, name: &str) -> Option<String> {
        TenantExtractor::parameter_option(&self.args, name)
    }

    pub fn tenant_option(&self) -> Option<TenantOption> {
        TenantExtractor::tenant_option(&self.args)
    }

    pub fn invocation(&self) -> Invocation {
        Invocation::console(&self.args)
    }

    fn is_bulk(&self) -> bool {
        self.tenant_option().is_some_and(|option| option.is_all())
    }
}

#[async_trait]
pub trait ConsoleCommand: Send {
    fn name(&self) -> &str;

    /// Run once against `context`, returning the process exit code.
    async fn run(
        &mut self,
        input: &ConsoleInput,
        output: &mut dyn ConsoleOutput,
        context: &mut TenantContext,
    ) -> anyhow::Result<i32>;
}

/// Outcome of the start hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandDecision {
    Run,
    /// `--tenant=*`: no single-shot run, one run per tenant at terminate
    Deferred,
    /// `--tenant` named a tenant that was not resolved
    Refused,
}

impl Resolver {
    pub fn on_command_start(
        &self,
        command: &str,
        input: &ConsoleInput,
        output: &mut dyn ConsoleOutput,
    ) -> CommandDecision {
        match input.tenant_option() {
            None => CommandDecision::Run,
            Some(TenantOption::All) => CommandDecision::Deferred,
            Some(TenantOption::Single(value)) => match self.active_tenant() {
                Some(tenant) => {
                    output.info(&format!("Running command for {}", tenant.domain));
                    CommandDecision::Run
                }
                None => {
                    tracing::warn!("Command {} disabled, tenant {} not resolved", command, value);
                    output.error(&format!(
                        "Tenant [{}] not found, command [{}] disabled",
                        value, command
                    ));
                    CommandDecision::Refused
                }
            },
        }
    }

    /// Bulk loop for `--tenant=*`. Returns `exit_code`, the code captured
    /// before the loop (`DISABLED_EXIT_CODE` for a deferred run), whatever
    /// the per-tenant runs returned. The first
    /// failing run is dispatched as `ConsoleEvent::Exception` and aborts
    /// the remaining tenants.
    pub async fn on_command_terminate<C>(
        &mut self,
        command: &mut C,
        input: &ConsoleInput,
        output: &mut dyn ConsoleOutput,
        exit_code: i32,
    ) -> Result<i32>
    where
        C: ConsoleCommand + ?Sized,
    {
        if !input.is_bulk() {
            return Ok(exit_code);
        }

        let tenants = self.directory().all_tenants().await?;
        tracing::info!("Running {} for {} tenants", command.name(), tenants.len());

        for tenant in tenants {
            let domain = tenant.domain.clone();
            self.set_active_tenant(tenant)?;
            output.info(&format!("Running command for {}", domain));

            match command.run(input, output, self.context_mut()).await {
                Ok(code) => {
                    tracing::debug!("{} for {} exited with {}", command.name(), domain, code);
                }
                Err(e) => {
                    let name = command.name().to_string();
                    self.console_dispatcher().emit(&ConsoleEvent::Exception {
                        command: name.clone(),
                        tenant: domain.clone(),
                        message: format!("{:#}", e),
                    });
                    return Err(TenantError::CommandFailed {
                        command: name,
                        tenant: domain,
                        source: e.into(),
                    });
                }
            }
        }

        Ok(exit_code)
    }

    /// Drive `command` through the full lifecycle. Resolution must already
    /// have run for `input` (see `boot`).
    pub async fn run_console_command<C>(
        &mut self,
        command: &mut C,
        input: &ConsoleInput,
        output: &mut dyn ConsoleOutput,
    ) -> Result<i32>
    where
        C: ConsoleCommand + ?Sized,
    {
        let exit_code = match self.on_command_start(command.name(), input, output) {
            CommandDecision::Run => {
                match command.run(input, output, self.context_mut()).await {
                    Ok(code) => code,
                    Err(e) => {
                        return Err(TenantError::CommandFailed {
                            command: command.name().to_string(),
                            tenant: self
                                .active_tenant()
                                .map(|t| t.domain.clone())
                                .unwrap_or_else(|| "(none)".to_string()),
                            source: e.into(),
                        });
                    }
                }
            }
            CommandDecision::Deferred => DISABLED_EXIT_CODE,
            CommandDecision::Refused => DISABLED_EXIT_CODE,
        };

        self.on_command_terminate(command, input, output, exit_code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::{fixture, new_tenant, test_context};
    use base64::{engine::general_purpose::STANDARD, Engine};
    use std::sync::{Arc, Mutex};
    use tenantable_database::{
        CredentialCodec, DatabaseError, InMemoryTenantDirectory, TenantDirectory,
    };
    use tenantable_models::{CredentialField, Tenant};

    #[derive(Default)]
    struct Buffer {
        info: Vec<String>,
        errors: Vec<String>,
    }

    impl ConsoleOutput for Buffer {
        fn info(&mut self, line: &str) {
            self.info.push(line.to_string());
        }

        fn error(&mut self, line: &str) {
            self.errors.push(line.to_string());
        }
    }

    /// Records the active tenant's domain on every run
    struct Recorder {
        runs: Vec<Option<String>>,
        fail_on_run: Option<usize>,
        exit_code: i32,
    }

    impl Recorder {
        fn new(exit_code: i32) -> Self {
            Self {
                runs: Vec::new(),
                fail_on_run: None,
                exit_code,
            }
        }
    }

    #[async_trait]
    impl ConsoleCommand for Recorder {
        fn name(&self) -> &str {
            "report"
        }

        async fn run(
            &mut self,
            _input: &ConsoleInput,
            _output: &mut dyn ConsoleOutput,
            context: &mut TenantContext,
        ) -> anyhow::Result<i32> {
            self.runs.push(context.tenant().map(|t| t.domain.clone()));
            if self.fail_on_run == Some(self.runs.len()) {
                anyhow::bail!("boom on run {}", self.runs.len());
            }
            Ok(self.exit_code)
        }
    }

    async fn three_tenants() -> Resolver {
        let codec = Arc::new(CredentialCodec::disabled());
        let (directory, _, _) = fixture(codec.clone()).await;
        directory
            .create_tenant(&new_tenant("d.example.com", ""))
            .await
            .unwrap();
        Resolver::new(directory, codec, test_context())
    }

    async fn boot(resolver: &mut Resolver, input: &ConsoleInput) {
        resolver.resolve_tenant(&input.invocation()).await.unwrap();
    }

    #[tokio::test]
    async fn test_bulk_runs_once_per_tenant_in_order() {
        let mut resolver = three_tenants().await;
        let input = ConsoleInput::new(["tenantable", "report", "--tenant=*"]);
        boot(&mut resolver, &input).await;

        let mut command = Recorder::new(5);
        let mut output = Buffer::default();
        let code = resolver
            .run_console_command(&mut command, &input, &mut output)
            .await
            .unwrap();

        assert_eq!(
            command.runs,
            vec![
                Some("a.example.com".to_string()),
                Some("b.example.com".to_string()),
                Some("d.example.com".to_string()),
            ]
        );
        // Exit code of the disabled single-shot run, not the per-tenant ones
        assert_eq!(code, DISABLED_EXIT_CODE);
        assert_eq!(output.info[0], "Running command for a.example.com");
        assert_eq!(output.info.len(), 3);
        assert_eq!(resolver.active_tenant().unwrap().domain, "d.example.com");
    }

    #[tokio::test]
    async fn test_bulk_error_aborts_remaining_runs() {
        let mut resolver = three_tenants().await;
        let input = ConsoleInput::new(["tenantable", "report", "--tenant", "all"]);
        boot(&mut resolver, &input).await;

        let exceptions = Arc::new(Mutex::new(Vec::new()));
        let sink = exceptions.clone();
        resolver
            .console_dispatcher()
            .subscribe(move |event: &ConsoleEvent| sink.lock().unwrap().push(event.clone()));

        let mut command = Recorder {
            fail_on_run: Some(2),
            ..Recorder::new(0)
        };
        let mut output = Buffer::default();
        let err = resolver
            .run_console_command(&mut command, &input, &mut output)
            .await
            .unwrap_err();

        assert_eq!(command.runs.len(), 2);
        assert!(matches!(
            &err,
            TenantError::CommandFailed { command, tenant, .. }
                if command == "report" && tenant == "b.example.com"
        ));

        let exceptions = exceptions.lock().unwrap();
        assert_eq!(
            *exceptions,
            vec![ConsoleEvent::Exception {
                command: "report".to_string(),
                tenant: "b.example.com".to_string(),
                message: "boom on run 2".to_string(),
            }]
        );
    }

    /// Serves every tenant, with one tenant's stored password replaced
    struct CorruptedDirectory {
        inner: Arc<InMemoryTenantDirectory>,
        corrupted: String,
    }

    #[async_trait]
    impl TenantDirectory for CorruptedDirectory {
        async fn find_tenant_by_domain(&self, host: &str) -> tenantable_database::Result<Option<Tenant>> {
            self.inner.find_tenant_by_domain(host).await
        }

        async fn find_tenant_by_id(&self, id: i64) -> tenantable_database::Result<Option<Tenant>> {
            self.inner.find_tenant_by_id(id).await
        }

        async fn find_tenant_by_uuid(&self, uuid: &str) -> tenantable_database::Result<Option<Tenant>> {
            self.inner.find_tenant_by_uuid(uuid).await
        }

        async fn find_domain_alias(
            &self,
            host: &str,
        ) -> tenantable_database::Result<Option<(tenantable_models::Domain, Tenant)>> {
            self.inner.find_domain_alias(host).await
        }

        async fn all_tenants(&self) -> tenantable_database::Result<Vec<Tenant>> {
            let mut tenants = self.inner.all_tenants().await?;
            for tenant in tenants.iter_mut().filter(|t| t.domain == self.corrupted) {
                tenant.password = "not-ciphertext".to_string();
            }
            Ok(tenants)
        }
    }

    #[tokio::test]
    async fn test_bulk_stops_at_undecryptable_tenant() {
        let codec = Arc::new(CredentialCodec::with_key(&STANDARD.encode([0x31u8; 32])).unwrap());
        let (inner, _, _) = fixture(codec.clone()).await;
        inner
            .create_tenant(&new_tenant("d.example.com", ""))
            .await
            .unwrap();
        let directory = Arc::new(CorruptedDirectory {
            inner,
            corrupted: "b.example.com".to_string(),
        });
        let mut resolver = Resolver::new(directory, codec, test_context());

        let input = ConsoleInput::new(["tenantable", "report", "--tenant=*"]);
        boot(&mut resolver, &input).await;

        let mut command = Recorder::new(0);
        let mut output = Buffer::default();
        let err = resolver
            .run_console_command(&mut command, &input, &mut output)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TenantError::Database(DatabaseError::Decryption {
                field: CredentialField::Password,
                ..
            })
        ));
        assert_eq!(command.runs, vec![Some("a.example.com".to_string())]);
        assert_eq!(output.info, vec!["Running command for a.example.com".to_string()]);

        // The last tenant that switched cleanly stays active with its own connection
        assert_eq!(resolver.active_tenant().unwrap().domain, "a.example.com");
        let connections = resolver.context().connections();
        assert_eq!(connections.default_profile().unwrap().database, "a");
        assert_eq!(connections.default_profile().unwrap().password, "pw-a.example.com");
    }

    #[tokio::test]
    async fn test_single_tenant_runs_once() {
        let mut resolver = three_tenants().await;
        let input = ConsoleInput::new(["tenantable", "report", "--tenant=b.example.com"]);
        boot(&mut resolver, &input).await;

        let mut command = Recorder::new(7);
        let mut output = Buffer::default();
        let code = resolver
            .run_console_command(&mut command, &input, &mut output)
            .await
            .unwrap();

        assert_eq!(code, 7);
        assert_eq!(command.runs, vec![Some("b.example.com".to_string())]);
        assert_eq!(output.info, vec!["Running command for b.example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_unresolved_tenant_refuses_command() {
        let mut resolver = three_tenants().await;
        let input = ConsoleInput::new(["tenantable", "report", "--tenant=missing"]);
        boot(&mut resolver, &input).await;

        let mut command = Recorder::new(0);
        let mut output = Buffer::default();
        let code = resolver
            .run_console_command(&mut command, &input, &mut output)
            .await
            .unwrap();

        assert_eq!(code, DISABLED_EXIT_CODE);
        assert!(command.runs.is_empty());
        assert_eq!(
            output.errors,
            vec!["Tenant [missing] not found, command [report] disabled".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_tenant_runs_without_context() {
        let mut resolver = three_tenants().await;
        let input = ConsoleInput::new(["tenantable", "report"]);
        boot(&mut resolver, &input).await;

        let mut command = Recorder::new(3);
        let mut output = Buffer::default();
        let code = resolver
            .run_console_command(&mut command, &input, &mut output)
            .await
            .unwrap();

        assert_eq!(code, 3);
        assert_eq!(command.runs, vec![None]);
        assert!(output.info.is_empty());
    }

    #[tokio::test]
    async fn test_single_run_error_is_wrapped() {
        let mut resolver = Resolver::new(
            Arc::new(InMemoryTenantDirectory::default()),
            Arc::new(CredentialCodec::disabled()),
            test_context(),
        );
        let input = ConsoleInput::new(["tenantable", "report"]);

        let mut command = Recorder {
            fail_on_run: Some(1),
            ..Recorder::new(0)
        };
        let err = resolver
            .run_console_command(&mut command, &input, &mut Buffer::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TenantError::CommandFailed { tenant, .. } if tenant == "(none)"));
        assert!(resolver.console_dispatcher().is_empty());
    }

    #[test]
    fn test_input_reads_tenant_option() {
        let input = ConsoleInput::new(vec!["tenantable".to_string(), "--tenant=3".to_string()]);
        assert_eq!(input.tenant_option(), Some(TenantOption::Single("3".to_string())));
        assert_eq!(input.parameter_option("--tenant").as_deref(), Some("3"));
        assert!(!input.is_bulk());
    }
}

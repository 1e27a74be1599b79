//! The sandbox instance: one per workspace root and session.

use crate::policy::{RunLimits, SandboxOptions};
use crate::runner::ProcessRunner;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use warden_core::audit::{AuditLogEntry, AuditSnapshot, AuditTrail};
use warden_core::paths::check_paths;
use warden_core::sanitize::{RedactionRule, Sanitizer};
use warden_core::trust::{LearnedStats, TrustStore};
use warden_core::validator::{Validator, is_sensitive, validate_input};
use warden_core::{
    Clock, CommandRunner, ConsentRequest, ExecutionResult, GuardError, Outcome, SecurityConfig,
    SystemClock, signature,
};

const CONSENT_REQUIRED: &str = "consent required";

/// Policy-checked command execution inside one workspace.
///
/// `execute` takes `&self` and may be called concurrently; shared state sits
/// behind mutexes that are never held across an await.
#[derive(Debug)]
pub struct Sandbox {
    workspace: PathBuf,
    config: SecurityConfig,
    enable_auditing: bool,
    trust: Mutex<TrustStore>,
    audit: Mutex<AuditTrail>,
    sanitizer: Sanitizer,
    runner: Arc<dyn CommandRunner>,
    clock: Arc<dyn Clock>,
}

impl Sandbox {
    /// Open a sandbox over `workspace`, spawning real processes.
    ///
    /// Fails only if the workspace root cannot be canonicalized.
    pub fn new(workspace: impl AsRef<Path>, options: SandboxOptions) -> Result<Self> {
        let workspace = canonical_workspace(workspace.as_ref())?;
        let runner = Arc::new(ProcessRunner::new(
            workspace.clone(),
            RunLimits::from(&options),
        ));
        Ok(Self::assemble(workspace, options, runner, Arc::new(SystemClock)))
    }

    /// Open a sandbox with an injected runner and clock.
    pub fn with_parts(
        workspace: impl AsRef<Path>,
        options: SandboxOptions,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let workspace = canonical_workspace(workspace.as_ref())?;
        Ok(Self::assemble(workspace, options, runner, clock))
    }

    fn assemble(
        workspace: PathBuf,
        options: SandboxOptions,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut config = SecurityConfig::resolve(options.security_level);
        if let Some(enabled) = options.enable_content_filtering {
            config = config.with_content_filtering(enabled);
        }
        let trust = TrustStore::open(
            &workspace,
            config.active_categories.clone(),
            options.enable_learning,
            Arc::clone(&clock),
        );
        info!(
            workspace = %workspace.display(),
            level = %config.level,
            learning = options.enable_learning,
            auditing = options.enable_auditing,
            content_filtering = config.content_filtering,
            "sandbox ready"
        );
        Self {
            sanitizer: Sanitizer::new(&workspace),
            workspace,
            config,
            enable_auditing: options.enable_auditing,
            trust: Mutex::new(trust),
            audit: Mutex::new(AuditTrail::default()),
            runner,
            clock,
        }
    }

    /// Append custom redaction rules after the built-in table.
    #[must_use]
    pub fn with_redaction_rules(mut self, rules: impl IntoIterator<Item = RedactionRule>) -> Self {
        for rule in rules {
            self.sanitizer = self.sanitizer.with_rule(rule);
        }
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn security_config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Check, run, sanitize and audit one command.
    ///
    /// A command that needs approval is not an error: it comes back as
    /// [`Outcome::ConsentRequired`] and nothing is spawned.
    pub async fn execute(&self, command: &str, args: &[String]) -> Result<Outcome, GuardError> {
        let started = self.clock.now();
        let entry = AuditLogEntry::new(started, command, args, self.config.level);

        if let Err(e) = validate_input(command, args) {
            self.record(entry.failed(e.to_string()));
            return Err(e);
        }

        let category = self
            .config
            .active_categories
            .lookup(command)
            .map(|(category, _)| category.to_string());

        let (needs_consent, is_learned, checked) = {
            let trust = self.trust.lock().expect("trust store mutex poisoned");
            let validator = Validator::new(&self.config, &trust);
            let is_learned = trust.is_learned(command);
            if validator.needs_consent(command, args) {
                (true, is_learned, Ok(()))
            } else {
                (false, is_learned, validator.validate(command, args))
            }
        };
        let entry = entry.with_category(category.clone(), is_learned);

        if needs_consent {
            self.record(entry.failed(CONSENT_REQUIRED));
            return Ok(Outcome::ConsentRequired(self.consent_request(
                command, args, category, is_learned,
            )));
        }

        if let Err(e) = checked {
            debug!(command, error = %e, "rejected by policy");
            self.record(entry.failed(e.to_string()));
            return Err(e.into());
        }

        let paths = match check_paths(&self.workspace, &self.config, args) {
            Ok(paths) => paths,
            Err(e) => {
                debug!(command, error = %e, "rejected by path guard");
                self.record(entry.failed(e.to_string()));
                return Err(e.into());
            }
        };

        let output = match self.runner.run(command, args).await {
            Ok(output) => output,
            Err(e) => {
                self.record(entry.failed(e.to_string()));
                return Err(e);
            }
        };

        let output = self.sanitizer.sanitize(&output, &self.config);
        self.record(entry.succeeded(paths.clone(), output.len()));

        Ok(Outcome::Executed(ExecutionResult {
            success: true,
            output,
            command: command.to_owned(),
            args: args.to_vec(),
            paths,
            security_level: self.config.level,
            content_filtered: self.config.content_filtering,
            output_sanitized: self.config.output_sanitization,
            timestamp: started,
        }))
    }

    /// Approve this exact signature for 24 hours. Commands outside the active
    /// catalog are also learned for the workspace. Returns whether the command
    /// was newly learned.
    pub fn grant_consent(&self, command: &str, args: &[String]) -> bool {
        self.trust
            .lock()
            .expect("trust store mutex poisoned")
            .grant_consent(command, args)
    }

    pub fn reset_learning(&self) {
        self.trust
            .lock()
            .expect("trust store mutex poisoned")
            .reset_learning();
    }

    pub fn learned_commands_stats(&self) -> LearnedStats {
        self.trust.lock().expect("trust store mutex poisoned").stats()
    }

    /// Most recent `limit` audit entries, oldest first, plus stats.
    pub fn audit_log(&self, limit: usize) -> AuditSnapshot {
        self.audit
            .lock()
            .expect("audit mutex poisoned")
            .snapshot(limit)
    }

    fn record(&self, entry: AuditLogEntry) {
        if !self.enable_auditing {
            return;
        }
        self.audit.lock().expect("audit mutex poisoned").record(entry);
    }

    fn consent_request(
        &self,
        command: &str,
        args: &[String],
        category: Option<String>,
        is_learned: bool,
    ) -> ConsentRequest {
        let operation = signature(command, args);
        let reason = if is_sensitive(command, args) {
            "is a sensitive operation"
        } else {
            "is not whitelisted"
        };
        ConsentRequest {
            requires_consent: true,
            message: format!(
                "'{operation}' {reason} at {} level and needs approval before it runs",
                self.config.level
            ),
            operation,
            security_level: self.config.level,
            command_category: category,
            is_learned,
        }
    }
}

fn canonical_workspace(workspace: &Path) -> Result<PathBuf> {
    workspace
        .canonicalize()
        .with_context(|| format!("failed to resolve workspace {}", workspace.display()))
}

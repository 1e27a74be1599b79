//! Consent and argument checks against the active policy.

use crate::error::{GuardError, PolicyError};
use crate::level::SecurityConfig;
use crate::trust::TrustStore;
use tracing::debug;

/// Invocations that always need approval, whatever the whitelist says.
/// Matched token-wise against the leading words of `command args...`.
const SENSITIVE_PREFIXES: &[&[&str]] = &[
    &["npm", "install"],
    &["npm", "i"],
    &["yarn", "add"],
    &["yarn", "install"],
    &["pnpm", "add"],
    &["pnpm", "install"],
    &["bun", "add"],
    &["bun", "install"],
    &["pip", "install"],
    &["cargo", "install"],
    &["rm"],
    &["rmdir"],
    &["del"],
    &["git", "push"],
    &["git", "commit"],
];

/// Whether the invocation begins with an irreversible operation.
pub fn is_sensitive(command: &str, args: &[String]) -> bool {
    let words = || std::iter::once(command).chain(args.iter().map(String::as_str));
    SENSITIVE_PREFIXES.iter().any(|prefix| {
        prefix.len() <= args.len() + 1 && prefix.iter().copied().eq(words().take(prefix.len()))
    })
}

/// Reject malformed requests before any policy evaluation.
pub fn validate_input(command: &str, args: &[String]) -> Result<(), GuardError> {
    if command.trim().is_empty() {
        return Err(GuardError::Input("command must not be empty".to_owned()));
    }
    if command.chars().any(char::is_whitespace) {
        return Err(GuardError::Input(format!(
            "command '{command}' must be a single program name; pass arguments separately"
        )));
    }
    if command.contains('\0') || args.iter().any(|a| a.contains('\0')) {
        return Err(GuardError::Input(
            "command and arguments must not contain NUL bytes".to_owned(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    config: &'a SecurityConfig,
    trust: &'a TrustStore,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a SecurityConfig, trust: &'a TrustStore) -> Self {
        Self { config, trust }
    }

    pub fn needs_consent(&self, command: &str, args: &[String]) -> bool {
        if let Some(record) = self.trust.consent(command, args) {
            return !record.granted;
        }

        if self.config.require_consent
            && self.config.active_categories.lookup(command).is_none()
            && !self.trust.is_learned(command)
        {
            debug!(command, "consent required: command not whitelisted");
            return true;
        }

        if is_sensitive(command, args) {
            debug!(command, "consent required: sensitive operation");
            return true;
        }

        false
    }

    pub fn validate(&self, command: &str, args: &[String]) -> Result<(), PolicyError> {
        let learned = self.trust.is_learned(command);
        let Some((category, policy)) = self.config.active_categories.lookup(command) else {
            // outside the catalog: learned, or approved for this exact invocation
            if learned || self.trust.is_consent_valid(command, args) {
                return Ok(());
            }
            return Err(PolicyError::CommandNotAllowed {
                command: command.to_owned(),
                level: self.config.level.to_string(),
                categories: self
                    .config
                    .active_categories
                    .names()
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
            });
        };

        if learned || policy.is_unrestricted() {
            return Ok(());
        }

        for arg in args {
            let checked = policy.check_all_arguments || arg.starts_with('-');
            if checked && !policy.allows(flag_name(arg)) {
                return Err(PolicyError::ArgumentNotAllowed {
                    command: command.to_owned(),
                    argument: arg.clone(),
                    allowed: policy
                        .allowed_arguments
                        .iter()
                        .map(|a| (*a).to_owned())
                        .collect(),
                });
            }
        }

        debug!(command, %category, "arguments within policy");
        Ok(())
    }
}

/// `--name=value` is checked as `--name`.
fn flag_name(arg: &str) -> &str {
    if arg.starts_with("--") {
        arg.split_once('=').map_or(arg, |(name, _)| name)
    } else {
        arg
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use crate::fakes::FakeClock;
    use crate::level::SecurityLevel;
    use crate::traits::Clock;
    use std::sync::Arc;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: SecurityConfig,
        trust: TrustStore,
    }

    impl Fixture {
        fn new(level: SecurityLevel) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = SecurityConfig::resolve(level);
            let clock: Arc<dyn Clock> = Arc::new(FakeClock::default());
            let trust =
                TrustStore::open(dir.path(), config.active_categories.clone(), true, clock);
            Self {
                _dir: dir,
                config,
                trust,
            }
        }

        fn validator(&self) -> Validator<'_> {
            Validator::new(&self.config, &self.trust)
        }
    }

    #[test]
    fn listed_flag_accepted_unlisted_rejected() {
        let f = Fixture::new(SecurityLevel::Strict);
        assert!(f.validator().validate("ls", &args(&["-la", "src"])).is_ok());
        let err = f
            .validator()
            .validate("ls", &args(&["--dired"]))
            .unwrap_err();
        assert!(matches!(err, PolicyError::ArgumentNotAllowed { ref argument, .. } if argument == "--dired"));
        assert!(err.to_string().contains("-la"));
    }

    #[test]
    fn every_catalog_command_rejects_an_unknown_flag() {
        let f = Fixture::new(SecurityLevel::Permissive);
        for category in Category::ALL {
            for policy in category.commands() {
                if policy.is_unrestricted() {
                    continue;
                }
                let first = policy.allowed_arguments[0];
                assert!(
                    f.validator().validate(policy.name, &args(&[first])).is_ok(),
                    "{} {first}",
                    policy.name
                );
                assert!(
                    f.validator()
                        .validate(policy.name, &args(&["--definitely-not-allowed"]))
                        .is_err(),
                    "{}",
                    policy.name
                );
            }
        }
    }

    #[test]
    fn empty_allowed_list_accepts_everything() {
        let f = Fixture::new(SecurityLevel::Strict);
        assert!(
            f.validator()
                .validate("echo", &args(&["-e", "--anything", "hello"]))
                .is_ok()
        );
    }

    #[test]
    fn subcommand_style_checks_positional_verbs() {
        let f = Fixture::new(SecurityLevel::Development);
        assert!(f.validator().validate("cargo", &args(&["build"])).is_ok());
        assert!(
            f.validator()
                .validate("cargo", &args(&["build", "--release"]))
                .is_ok()
        );
        let err = f
            .validator()
            .validate("cargo", &args(&["publish"]))
            .unwrap_err();
        assert!(matches!(err, PolicyError::ArgumentNotAllowed { .. }));
    }

    #[test]
    fn positional_data_is_not_checked_for_flag_style_tools() {
        let f = Fixture::new(SecurityLevel::Strict);
        assert!(f.validator().validate("grep", &args(&["needle"])).is_ok());
        assert!(
            f.validator()
                .validate("grep", &args(&["-rn", "needle", "src/"]))
                .is_ok()
        );
        assert!(
            f.validator()
                .validate("grep", &args(&["--include=*.rs", "needle"]))
                .is_ok()
        );
        assert!(
            f.validator()
                .validate("grep", &args(&["--perl-regexp", "needle"]))
                .is_err()
        );
    }

    #[test]
    fn unknown_command_rejected_with_categories() {
        let f = Fixture::new(SecurityLevel::Strict);
        let err = f.validator().validate("curl", &args(&["x"])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("STRICT"));
        assert!(msg.contains("FILESYSTEM, SEARCH"));
    }

    #[test]
    fn learned_command_skips_argument_checks() {
        let mut f = Fixture::new(SecurityLevel::Development);
        assert!(f.validator().validate("bun", &args(&["test"])).is_err());
        f.trust.grant_consent("bun", &args(&["test"]));
        assert!(
            f.validator()
                .validate("bun", &args(&["--anything", "goes"]))
                .is_ok()
        );
    }

    #[test]
    fn consent_admits_exact_signature_when_learning_is_off() {
        let dir = tempfile::tempdir().unwrap();
        let config = SecurityConfig::resolve(SecurityLevel::Development);
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::default());
        let mut trust = TrustStore::open(dir.path(), config.active_categories.clone(), false, clock);

        assert!(!trust.grant_consent("bun", &args(&["test"])));
        let validator = Validator::new(&config, &trust);
        assert!(validator.validate("bun", &args(&["test"])).is_ok());
        assert!(validator.validate("bun", &args(&["run", "lint"])).is_err());
    }

    #[test]
    fn development_requires_consent_for_unknown_commands() {
        let mut f = Fixture::new(SecurityLevel::Development);
        assert!(f.validator().needs_consent("bun", &args(&["test"])));
        f.trust.grant_consent("bun", &args(&["test"]));
        assert!(!f.validator().needs_consent("bun", &args(&["test"])));
        // learned, so a different signature skips step 2
        assert!(!f.validator().needs_consent("bun", &args(&["run", "lint"])));
    }

    #[test]
    fn other_levels_do_not_ask_for_unknown_commands() {
        let f = Fixture::new(SecurityLevel::Strict);
        assert!(!f.validator().needs_consent("bun", &args(&["test"])));
        assert!(f.validator().validate("bun", &args(&["test"])).is_err());
    }

    #[test]
    fn sensitive_prefixes_always_need_consent() {
        let f = Fixture::new(SecurityLevel::Permissive);
        assert!(f.validator().needs_consent("git", &args(&["push", "origin"])));
        assert!(f.validator().needs_consent("git", &args(&["commit"])));
        assert!(f.validator().needs_consent("rm", &args(&["-rf", "build"])));
        assert!(f.validator().needs_consent("npm", &args(&["install"])));
        assert!(!f.validator().needs_consent("git", &args(&["status"])));
        assert!(!f.validator().needs_consent("npm", &args(&["test"])));
    }

    #[test]
    fn sensitive_prefix_is_token_wise() {
        assert!(is_sensitive("rm", &[]));
        assert!(!is_sensitive("rmate", &args(&["file"])));
        assert!(!is_sensitive("git", &[]));
        assert!(!is_sensitive("git", &args(&["pushy"])));
        assert!(is_sensitive("pip", &args(&["install", "requests"])));
    }

    #[test]
    fn consent_for_sensitive_operation_is_per_signature() {
        let mut f = Fixture::new(SecurityLevel::Balanced);
        f.trust.grant_consent("git", &args(&["push"]));
        assert!(!f.validator().needs_consent("git", &args(&["push"])));
        assert!(f.validator().needs_consent("git", &args(&["push", "--force"])));
    }

    #[test]
    fn input_validation() {
        assert!(validate_input("ls", &args(&["-la"])).is_ok());
        assert!(validate_input("", &[]).is_err());
        assert!(validate_input("   ", &[]).is_err());
        assert!(validate_input("ls -la", &[]).is_err());
        assert!(validate_input("ls", &args(&["a\0b"])).is_err());
    }
}

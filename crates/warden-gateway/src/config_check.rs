use std::path::Path;

use warden_core::SecurityLevel;
use warden_core::sanitize::{RedactionRule, SensitiveKind};
use warden_core::trust::LEARNED_FILE;
use warden_sandbox::parse_size;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CheckResult {
    pub name: &'static str,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Default)]
pub(crate) struct CheckReport {
    pub results: Vec<CheckResult>,
}

impl CheckReport {
    pub(crate) fn push(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    pub(crate) fn has_errors(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.severity == Severity::Error && !r.passed)
    }

    fn error_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.severity == Severity::Error && !r.passed)
            .count()
    }

    fn warning_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.severity == Severity::Warning && !r.passed)
            .count()
    }

    fn format_result(r: &CheckResult) -> String {
        let icon = if r.severity == Severity::Info {
            "·"
        } else if r.passed {
            "✓"
        } else {
            match r.severity {
                Severity::Warning => "⚠",
                _ => "✗",
            }
        };
        format!("{icon} {}", r.message)
    }

    pub(crate) fn to_summary_string(&self) -> String {
        let mut lines: Vec<String> = self.results.iter().map(Self::format_result).collect();
        let errors = self.error_count();
        let warnings = self.warning_count();
        if errors == 0 && warnings == 0 {
            lines.push("\nall checks passed".to_owned());
        } else {
            lines.push(format!("\n{errors} error(s), {warnings} warning(s)"));
        }
        lines.join("\n")
    }

    pub(crate) fn print_human(&self) {
        println!("{}", self.to_summary_string());
    }

    pub(crate) fn print_json(&self) {
        let value = self.to_json_value();
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_default()
        );
    }

    pub(crate) fn to_json_value(&self) -> serde_json::Value {
        let checks: Vec<serde_json::Value> = self
            .results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name,
                    "severity": r.severity.as_str(),
                    "passed": r.passed,
                    "message": r.message,
                })
            })
            .collect();

        serde_json::json!({
            "passed": !self.has_errors(),
            "errors": self.error_count(),
            "warnings": self.warning_count(),
            "checks": checks,
        })
    }
}

fn check(name: &'static str, severity: Severity, passed: bool, message: String) -> CheckResult {
    CheckResult {
        name,
        severity,
        passed,
        message,
    }
}

pub(crate) fn validate_config(config_path: &Path, config_dir: &Path) -> CheckReport {
    let mut report = CheckReport::default();

    // 1. toml_parse
    let config = if config_path.exists() {
        match Config::load(config_path) {
            Ok(c) => {
                report.push(check(
                    "toml_parse",
                    Severity::Error,
                    true,
                    "config syntax valid".to_owned(),
                ));
                c
            }
            Err(e) => {
                report.push(check("toml_parse", Severity::Error, false, format!("{e:#}")));
                return report;
            }
        }
    } else {
        report.push(check(
            "toml_parse",
            Severity::Info,
            true,
            format!("no config at {}, using defaults", config_path.display()),
        ));
        Config::default()
    };

    // 2. workspace_exists
    match config.resolve_workspace(config_dir) {
        Ok(ws) => {
            report.push(check(
                "workspace_exists",
                Severity::Error,
                true,
                format!(
                    "workspace: {}",
                    ws.canonicalize().unwrap_or_else(|_| ws.clone()).display()
                ),
            ));
            report.push(check(
                "learned_file",
                Severity::Info,
                true,
                if config.sandbox.enable_learning {
                    format!("learned commands: {}", ws.join(LEARNED_FILE).display())
                } else {
                    "learning disabled".to_owned()
                },
            ));
        }
        Err(e) => report.push(check(
            "workspace_exists",
            Severity::Error,
            false,
            format!("{e}"),
        )),
    }

    // 3. security_level_known
    let level_name = &config.sandbox.security_level;
    let level = SecurityLevel::from_name(level_name);
    report.push(check(
        "security_level_known",
        Severity::Warning,
        level.is_some(),
        match level {
            Some(level) => format!("security level: {level}"),
            None => format!("unknown security level '{level_name}', DEVELOPMENT will be used"),
        },
    ));

    // 4. max_output_size
    let size = parse_size(&config.sandbox.max_output_size);
    let size_ok = matches!(size, Ok(n) if n > 0);
    report.push(check(
        "max_output_size",
        Severity::Error,
        size_ok,
        match size {
            Ok(n) if n > 0 => format!("max output size: {n} bytes"),
            Ok(_) => "sandbox.max_output_size must be non-zero".to_owned(),
            Err(e) => format!("sandbox.max_output_size: {e}"),
        },
    ));

    // 5. timeout
    let timeout_ok = config.sandbox.timeout_ms > 0;
    report.push(check(
        "timeout",
        Severity::Error,
        timeout_ok,
        if timeout_ok {
            format!("timeout: {}ms", config.sandbox.timeout_ms)
        } else {
            "sandbox.timeout_ms must be non-zero".to_owned()
        },
    ));

    // 6. redaction_patterns
    for rule in &config.redaction {
        let compiled = RedactionRule::new(SensitiveKind::Custom(rule.name.clone()), &rule.pattern);
        report.push(check(
            "redaction_pattern",
            Severity::Error,
            compiled.is_ok(),
            match compiled {
                Ok(_) => format!("redaction rule '{}' compiles", rule.name),
                Err(e) => format!("redaction rule '{}': {e}", rule.name),
            },
        ));
    }

    report
}

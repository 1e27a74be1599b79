//! JSON-lines session protocol: one request per line on stdin, one response
//! per line on stdout, against a single long-lived sandbox.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};
use warden_core::audit::AuditSnapshot;
use warden_core::trust::LearnedStats;
use warden_core::{ConsentRequest, ExecutionResult, Outcome, SecurityConfig, signature};
use warden_sandbox::Sandbox;

const DEFAULT_AUDIT_LIMIT: usize = 50;

fn default_audit_limit() -> usize {
    DEFAULT_AUDIT_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum SessionRequest {
    Execute {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    GrantConsent {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    ResetLearning,
    LearnedStats,
    AuditLog {
        #[serde(default = "default_audit_limit")]
        limit: usize,
    },
    SecurityConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum SessionResponse {
    Executed { result: ExecutionResult },
    ConsentRequired { request: ConsentRequest },
    ConsentGranted { operation: String, learned: bool },
    LearningReset,
    LearnedStats { stats: LearnedStats },
    AuditLog { log: AuditSnapshot },
    SecurityConfig { config: SecurityConfig },
    Error { kind: String, message: String },
}

impl SessionResponse {
    fn error(kind: &str, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.to_owned(),
            message: message.into(),
        }
    }
}

pub(crate) async fn handle(sandbox: &Sandbox, request: SessionRequest) -> SessionResponse {
    match request {
        SessionRequest::Execute { command, args } => {
            match sandbox.execute(&command, &args).await {
                Ok(Outcome::Executed(result)) => SessionResponse::Executed { result },
                Ok(Outcome::ConsentRequired(request)) => {
                    SessionResponse::ConsentRequired { request }
                }
                Err(e) => SessionResponse::error(e.kind(), e.to_string()),
            }
        }
        SessionRequest::GrantConsent { command, args } => {
            let learned = sandbox.grant_consent(&command, &args);
            SessionResponse::ConsentGranted {
                operation: signature(&command, &args),
                learned,
            }
        }
        SessionRequest::ResetLearning => {
            sandbox.reset_learning();
            SessionResponse::LearningReset
        }
        SessionRequest::LearnedStats => SessionResponse::LearnedStats {
            stats: sandbox.learned_commands_stats(),
        },
        SessionRequest::AuditLog { limit } => SessionResponse::AuditLog {
            log: sandbox.audit_log(limit),
        },
        SessionRequest::SecurityConfig => SessionResponse::SecurityConfig {
            config: sandbox.security_config().clone(),
        },
    }
}

/// Serve requests until the reader reaches EOF.
pub(crate) async fn run<R, W>(sandbox: &Sandbox, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(workspace = %sandbox.workspace().display(), "session started");
    let mut lines = reader.lines();
    let mut served = 0usize;

    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read session request")?
    {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<SessionRequest>(&line) {
            Ok(request) => {
                debug!(?request, "session request");
                handle(sandbox, request).await
            }
            Err(e) => SessionResponse::error("input", format!("invalid request: {e}")),
        };

        let encoded =
            serde_json::to_string(&response).context("failed to encode session response")?;
        writer
            .write_all(encoded.as_bytes())
            .await
            .context("failed to write session response")?;
        writer
            .write_all(b"\n")
            .await
            .context("failed to write message delimiter")?;
        writer
            .flush()
            .await
            .context("failed to flush session response")?;
        served += 1;
    }

    info!(served, "session ended");
    Ok(())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Arc;
    use warden_core::SecurityLevel;
    use warden_core::fakes::{FakeClock, FakeRunner};
    use warden_core::{Clock, CommandRunner};
    use warden_sandbox::SandboxOptions;

    fn sandbox(dir: &tempfile::TempDir, runner: &Arc<FakeRunner>) -> Sandbox {
        Sandbox::with_parts(
            dir.path(),
            SandboxOptions {
                security_level: SecurityLevel::Development,
                ..SandboxOptions::default()
            },
            Arc::clone(runner) as Arc<dyn CommandRunner>,
            Arc::new(FakeClock::default()) as Arc<dyn Clock>,
        )
        .unwrap()
    }

    async fn exchange(sandbox: &Sandbox, input: &str) -> Vec<Value> {
        let mut out = Vec::new();
        run(sandbox, input.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn request_wire_format() {
        let request: SessionRequest =
            serde_json::from_str(r#"{"type":"execute","command":"ls","args":["-la"]}"#).unwrap();
        assert_eq!(
            request,
            SessionRequest::Execute {
                command: "ls".to_owned(),
                args: vec!["-la".to_owned()],
            }
        );
        let request: SessionRequest = serde_json::from_str(r#"{"type":"audit_log"}"#).unwrap();
        assert_eq!(request, SessionRequest::AuditLog { limit: 50 });
    }

    #[tokio::test]
    async fn consent_flow_across_requests() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::with_output("3 passed"));
        let sandbox = sandbox(&dir, &runner);

        let responses = exchange(
            &sandbox,
            concat!(
                r#"{"type":"execute","command":"bun","args":["test"]}"#,
                "\n\n",
                r#"{"type":"grant_consent","command":"bun","args":["test"]}"#,
                "\n",
                r#"{"type":"execute","command":"bun","args":["test"]}"#,
                "\n",
                r#"{"type":"audit_log","limit":10}"#,
                "\n",
            ),
        )
        .await;

        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0]["type"], "consent_required");
        assert_eq!(responses[0]["request"]["operation"], "bun test");
        assert_eq!(responses[1]["type"], "consent_granted");
        assert_eq!(responses[1]["learned"], true);
        assert_eq!(responses[2]["type"], "executed");
        assert_eq!(responses[2]["result"]["output"], "3 passed");
        assert_eq!(responses[3]["log"]["stats"]["totalCommands"], 2);
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn errors_are_reported_in_band() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let sandbox = sandbox(&dir, &runner);

        let responses = exchange(
            &sandbox,
            concat!(
                "not json\n",
                r#"{"type":"execute","command":"cargo","args":["publish"]}"#,
                "\n",
                r#"{"type":"security_config"}"#,
                "\n",
            ),
        )
        .await;

        assert_eq!(responses[0]["type"], "error");
        assert_eq!(responses[0]["kind"], "input");
        assert_eq!(responses[1]["kind"], "policy");
        assert_eq!(responses[2]["config"]["level"], "DEVELOPMENT");
        assert_eq!(responses[2]["config"]["requireConsent"], true);
    }
}

use crate::level::SecurityLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Returned instead of spawning when a human has to approve the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRequest {
    /// Always `true`; lets JSON consumers branch on a single field.
    pub requires_consent: bool,
    /// The exact signature that needs approval (`"<command> <args>"`).
    pub operation: String,
    pub message: String,
    pub security_level: SecurityLevel,
    /// Catalog category of the command, if it has one at this level.
    pub command_category: Option<String>,
    pub is_learned: bool,
}

/// A successful, sanitized execution.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub command: String,
    pub args: Vec<String>,
    /// Path arguments, relative to the workspace root.
    pub paths: Vec<String>,
    pub security_level: SecurityLevel,
    pub content_filtered: bool,
    pub output_sanitized: bool,
    pub timestamp: DateTime<Utc>,
}

/// What `execute` hands back when it does not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    ConsentRequired(ConsentRequest),
    Executed(ExecutionResult),
}

impl Outcome {
    pub fn requires_consent(&self) -> bool {
        matches!(self, Self::ConsentRequired(_))
    }

    pub fn into_result(self) -> Option<ExecutionResult> {
        match self {
            Self::Executed(result) => Some(result),
            Self::ConsentRequired(_) => None,
        }
    }

    pub fn as_consent_request(&self) -> Option<&ConsentRequest> {
        match self {
            Self::ConsentRequired(request) => Some(request),
            Self::Executed(_) => None,
        }
    }
}

/// The consent-cache key for an invocation: `"<command> <args joined by space>"`.
pub fn signature(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_owned()
    } else {
        format!("{command} {}", args.join(" "))
    }
}

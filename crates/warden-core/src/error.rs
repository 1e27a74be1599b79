use std::time::Duration;
use thiserror::Error;

/// A request rejected by the active policy before anything was spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error(
        "command '{command}' is not allowed at {level} level. Available categories: {}",
        categories.join(", ")
    )]
    CommandNotAllowed {
        command: String,
        level: String,
        categories: Vec<String>,
    },

    #[error(
        "argument '{argument}' is not allowed for '{command}'. Allowed arguments: {}",
        allowed.join(", ")
    )]
    ArgumentNotAllowed {
        command: String,
        argument: String,
        allowed: Vec<String>,
    },

    #[error("path '{path}' resolves outside the workspace")]
    PathOutsideWorkspace { path: String },

    #[error("file extension '.{extension}' is not allowed ({path})")]
    ExtensionNotAllowed { path: String, extension: String },
}

/// Every way an `execute` call can fail.
///
/// Consent-pending is deliberately absent: it is a successful outcome.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("output exceeded {limit} bytes, process terminated")]
    OutputLimit { limit: usize },

    #[error("command timed out after {}ms, process terminated", timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("command exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("failed to execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl GuardError {
    /// Coarse error class: `input`, `policy`, `resource` or `execution`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Policy(_) => "policy",
            Self::OutputLimit { .. } | Self::Timeout { .. } => "resource",
            Self::NonZeroExit { .. } | Self::Spawn { .. } => "execution",
        }
    }

    /// Whether the error was raised before any process was spawned.
    pub fn is_pre_spawn(&self) -> bool {
        matches!(self, Self::Input(_) | Self::Policy(_))
    }
}

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "Policy-checked command execution for agents"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Security level override: strict, balanced, development or permissive.
    #[arg(long, global = true)]
    pub level: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run one command through the sandbox.
    Exec {
        /// Grant consent and re-run if the command needs approval.
        #[arg(long)]
        yes: bool,

        command: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Approve a command signature (and learn the command if it is not whitelisted).
    Grant {
        command: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Forget every learned command for the workspace.
    Reset,
    Learned {
        /// Output format: human (default) or json
        #[arg(long, default_value = "human")]
        format: String,
    },
    /// Print the resolved security configuration and active catalog.
    Policy,
    Check {
        /// Output format: human (default) or json
        #[arg(long, default_value = "human")]
        format: String,
    },
    /// JSON-lines request/response loop on stdin/stdout.
    Session,
    Version,
}

impl Commands {
    /// Console log filter used when `RUST_LOG` is unset.
    pub(crate) fn default_log_filter(&self) -> &'static str {
        match self {
            Self::Session => "info",
            _ => "warn",
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_passes_flags_through_to_the_command() {
        let cli = Cli::try_parse_from(["warden", "exec", "ls", "-la", "src"]).unwrap();
        let Commands::Exec { yes, command, args } = cli.command else {
            panic!("expected exec");
        };
        assert!(!yes);
        assert_eq!(command, "ls");
        assert_eq!(args, vec!["-la", "src"]);
    }

    #[test]
    fn exec_yes_and_global_level() {
        let cli =
            Cli::try_parse_from(["warden", "--level", "strict", "exec", "--yes", "bun", "test"])
                .unwrap();
        assert_eq!(cli.level.as_deref(), Some("strict"));
        assert!(matches!(cli.command, Commands::Exec { yes: true, .. }));
    }

    #[test]
    fn session_logs_at_info() {
        let cli = Cli::try_parse_from(["warden", "session"]).unwrap();
        assert_eq!(cli.command.default_log_filter(), "info");
        let cli = Cli::try_parse_from(["warden", "reset"]).unwrap();
        assert_eq!(cli.command.default_log_filter(), "warn");
    }
}

#![allow(clippy::print_stdout, clippy::print_stderr)] // CLI binary: stdout/stderr is the UI

mod cli;
mod config;
mod config_check;
mod session;
mod tracing_setup;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use warden_core::catalog::Category;
use warden_core::{ConsentRequest, Outcome};
use warden_sandbox::Sandbox;

use crate::cli::{Cli, Commands};
use crate::config::Config;

/// Exit status when a command needs approval and `--yes` was not given.
const EXIT_CONSENT_REQUIRED: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _tracing_guard = tracing_setup::init(cli.command.default_log_filter());

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "warden starting"
    );

    let config_path = cli.config.as_deref();
    let level = cli.level.as_deref();

    match cli.command {
        Commands::Exec {
            yes,
            command,
            args,
        } => cmd_exec(config_path, level, yes, &command, &args).await,
        Commands::Grant { command, args } => cmd_grant(config_path, level, &command, &args),
        Commands::Reset => cmd_reset(config_path, level),
        Commands::Learned { format } => cmd_learned(config_path, level, &format),
        Commands::Policy => cmd_policy(config_path, level),
        Commands::Check { format } => cmd_check(config_path, &format),
        Commands::Session => cmd_session(config_path, level).await,
        Commands::Version => {
            println!("warden {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_sandbox(config_path: Option<&str>, level: Option<&str>) -> Result<Sandbox> {
    let config_file = Config::find_config_path(config_path);
    let config = Config::load_or_default(&config_file)?;
    let workspace = config.resolve_workspace(&Config::base_dir(&config_file))?;
    let options = config.sandbox_options(level)?;
    let rules = config.redaction_rules()?;
    debug!(
        config = %config_file.display(),
        custom_rules = rules.len(),
        "opening sandbox"
    );
    Ok(Sandbox::new(&workspace, options)?.with_redaction_rules(rules))
}

/// Only commands outside the catalog are learned, and only when learning is
/// on; any other grant lives in this process's consent cache.
fn grant_persists(sandbox: &Sandbox, request: &ConsentRequest) -> bool {
    request.command_category.is_none() && sandbox.learned_commands_stats().learning_enabled
}

fn print_consent_request(sandbox: &Sandbox, request: &ConsentRequest) {
    eprintln!("consent required: {}", request.message);
    if grant_persists(sandbox, request) {
        eprintln!("approve with: warden grant {}", request.operation);
    } else {
        eprintln!(
            "approve and run with: warden exec --yes {} (or approve it inside `warden session`)",
            request.operation
        );
    }
}

// ---------------------------------------------------------------------------
// cmd_exec: one execution through the sandbox
// ---------------------------------------------------------------------------

async fn cmd_exec(
    config_path: Option<&str>,
    level: Option<&str>,
    yes: bool,
    command: &str,
    args: &[String],
) -> Result<()> {
    let sandbox = open_sandbox(config_path, level)?;

    let mut outcome = sandbox.execute(command, args).await?;
    if let Outcome::ConsentRequired(request) = &outcome {
        if !yes {
            print_consent_request(&sandbox, request);
            std::process::exit(EXIT_CONSENT_REQUIRED);
        }
        info!(operation = %request.operation, "granting consent from --yes");
        sandbox.grant_consent(command, args);
        outcome = sandbox.execute(command, args).await?;
    }

    match outcome {
        Outcome::Executed(result) => {
            print!("{}", result.output);
            Ok(())
        }
        Outcome::ConsentRequired(request) => {
            // a sensitive command whose grant did not take
            print_consent_request(&sandbox, &request);
            std::process::exit(EXIT_CONSENT_REQUIRED);
        }
    }
}

// ---------------------------------------------------------------------------
// Trust store management
// ---------------------------------------------------------------------------

fn cmd_grant(
    config_path: Option<&str>,
    level: Option<&str>,
    command: &str,
    args: &[String],
) -> Result<()> {
    let sandbox = open_sandbox(config_path, level)?;
    let operation = warden_core::signature(command, args);
    if sandbox.grant_consent(command, args) {
        println!("learned '{command}' for {}", sandbox.workspace().display());
    } else if sandbox
        .learned_commands_stats()
        .commands
        .iter()
        .any(|learned| learned == command)
    {
        println!("'{command}' is already learned for {}", sandbox.workspace().display());
    } else {
        // nothing was written, so the approval ends with this process
        println!("consent for '{operation}' lasts only for this process and was not saved");
        println!("approve and run with: warden exec --yes {operation}");
    }
    Ok(())
}

fn cmd_reset(config_path: Option<&str>, level: Option<&str>) -> Result<()> {
    let sandbox = open_sandbox(config_path, level)?;
    let before = sandbox.learned_commands_stats().total_learned;
    sandbox.reset_learning();
    println!("forgot {before} learned command(s)");
    Ok(())
}

fn cmd_learned(config_path: Option<&str>, level: Option<&str>, format: &str) -> Result<()> {
    let sandbox = open_sandbox(config_path, level)?;
    let stats = sandbox.learned_commands_stats();

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("failed to encode learned stats")?
        );
        return Ok(());
    }

    if !stats.learning_enabled {
        println!("learning disabled");
        return Ok(());
    }
    if let Some(path) = &stats.persistence_path {
        println!("{}", path.display());
    }
    if stats.commands.is_empty() {
        println!("no learned commands");
    }
    for command in &stats.commands {
        println!("  {command}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// cmd_policy: resolved security configuration and active catalog
// ---------------------------------------------------------------------------

fn cmd_policy(config_path: Option<&str>, level: Option<&str>) -> Result<()> {
    let sandbox = open_sandbox(config_path, level)?;
    let config = sandbox.security_config();

    println!("level:               {}", config.level);
    println!("workspace:           {}", sandbox.workspace().display());
    println!("require consent:     {}", config.require_consent);
    println!("content filtering:   {}", config.content_filtering);
    println!("path restrictions:   {}", config.path_restrictions);
    println!("output sanitization: {}", config.output_sanitization);
    match &config.allowed_extensions {
        Some(extensions) => println!(
            "allowed extensions:  {}",
            extensions.iter().cloned().collect::<Vec<_>>().join(", ")
        ),
        None => println!("allowed extensions:  any"),
    }

    for category in Category::ALL {
        let active = config.active_categories.contains(category);
        println!("\n{category}{}", if active { "" } else { " (inactive)" });
        for policy in category.commands() {
            let args = if policy.is_unrestricted() {
                "any arguments".to_owned()
            } else {
                policy.allowed_arguments.join(" ")
            };
            let mode = if policy.check_all_arguments {
                "all"
            } else {
                "flags"
            };
            println!("  {:<16} [{mode}] {args}", policy.name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// cmd_check: validate config without running anything
// ---------------------------------------------------------------------------

#[allow(clippy::unnecessary_wraps)] // must return Result to match main's match arms
fn cmd_check(config_path: Option<&str>, format: &str) -> Result<()> {
    let config_file = Config::find_config_path(config_path);
    let config_dir: PathBuf = Config::base_dir(&config_file);

    let report = config_check::validate_config(&config_file, &config_dir);

    match format {
        "json" => report.print_json(),
        _ => report.print_human(),
    }

    if report.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// cmd_session: JSON-lines loop over stdin/stdout
// ---------------------------------------------------------------------------

async fn cmd_session(config_path: Option<&str>, level: Option<&str>) -> Result<()> {
    let sandbox = open_sandbox(config_path, level)?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    session::run(&sandbox, stdin, tokio::io::stdout()).await
}

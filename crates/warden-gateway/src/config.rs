use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use warden_core::SecurityLevel;
use warden_core::sanitize::{RedactionRule, SensitiveKind};
use warden_sandbox::{SandboxOptions, parse_size};

pub(crate) const CONFIG_FILE: &str = "warden.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub redaction: Vec<RedactionConfig>,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SandboxConfig {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default = "default_security_level")]
    pub security_level: String,
    #[serde(default = "default_true")]
    pub enable_learning: bool,
    #[serde(default = "default_true")]
    pub enable_auditing: bool,
    /// Overrides the level default when present.
    #[serde(default)]
    pub enable_content_filtering: Option<bool>,
    /// Bytes, or a size with a k/m/g suffix.
    #[serde(default = "default_max_output_size")]
    pub max_output_size: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            security_level: default_security_level(),
            enable_learning: true,
            enable_auditing: true,
            enable_content_filtering: None,
            max_output_size: default_max_output_size(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// A custom redaction rule, applied after the built-in ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RedactionConfig {
    pub name: String,
    pub pattern: String,
}

fn default_workspace() -> String {
    ".".to_owned()
}

fn default_security_level() -> String {
    "development".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_max_output_size() -> String {
    "1m".to_owned()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Config {
    /// Load config from a TOML file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load config, falling back to defaults when the file does not exist.
    pub(crate) fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolve the workspace directory to an absolute path.
    ///
    /// Fails if the directory does not exist.
    pub(crate) fn resolve_workspace(&self, base_dir: &Path) -> Result<PathBuf> {
        let workspace = PathBuf::from(&self.sandbox.workspace);
        let resolved = if workspace.is_absolute() {
            workspace
        } else {
            base_dir.join(workspace)
        };
        anyhow::ensure!(
            resolved.is_dir(),
            "workspace directory not found: {}",
            resolved.display()
        );
        debug!(workspace = %resolved.display(), "resolved workspace path");
        Ok(resolved)
    }

    /// Resolve config path: check arg, then default locations.
    pub(crate) fn find_config_path(explicit: Option<&str>) -> PathBuf {
        if let Some(p) = explicit {
            return PathBuf::from(p);
        }

        // Check current directory
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return local;
        }

        // Check XDG config, then ~/.config/warden
        for dir in user_config_dirs() {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return candidate;
            }
        }

        // Default to local
        local
    }

    /// Directory relative paths in the config are resolved against.
    ///
    /// A per-user config applies to whatever directory warden runs in, so its
    /// relative paths resolve against the current directory. Any other config
    /// resolves them against its own directory.
    pub(crate) fn base_dir(config_path: &Path) -> PathBuf {
        base_dir_in(config_path, &user_config_dirs())
    }

    /// The configured level, unless `level_override` names one.
    /// Unknown names fall back to DEVELOPMENT.
    pub(crate) fn security_level(&self, level_override: Option<&str>) -> SecurityLevel {
        SecurityLevel::parse(level_override.unwrap_or(&self.sandbox.security_level))
    }

    pub(crate) fn sandbox_options(&self, level_override: Option<&str>) -> Result<SandboxOptions> {
        let max_output_size = parse_size(&self.sandbox.max_output_size)
            .context("invalid sandbox.max_output_size")?;
        anyhow::ensure!(max_output_size > 0, "sandbox.max_output_size must be non-zero");
        anyhow::ensure!(
            self.sandbox.timeout_ms > 0,
            "sandbox.timeout_ms must be non-zero"
        );
        Ok(SandboxOptions {
            security_level: self.security_level(level_override),
            enable_learning: self.sandbox.enable_learning,
            enable_auditing: self.sandbox.enable_auditing,
            enable_content_filtering: self.sandbox.enable_content_filtering,
            max_output_size,
            timeout: Duration::from_millis(self.sandbox.timeout_ms),
        })
    }

    pub(crate) fn redaction_rules(&self) -> Result<Vec<RedactionRule>> {
        self.redaction
            .iter()
            .map(|r| {
                RedactionRule::new(SensitiveKind::Custom(r.name.clone()), &r.pattern)
                    .with_context(|| format!("invalid redaction pattern '{}'", r.name))
            })
            .collect()
    }
}

/// `$XDG_CONFIG_HOME/warden` and `~/.config/warden`, in lookup order.
fn user_config_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
        dirs.push(PathBuf::from(config_dir).join("warden"));
    }
    if let Ok(home) = std::env::var("HOME") {
        dirs.push(PathBuf::from(home).join(".config/warden"));
    }
    dirs
}

fn base_dir_in(config_path: &Path, user_dirs: &[PathBuf]) -> PathBuf {
    match config_path.parent() {
        Some(dir) if user_dirs.iter().any(|user| user == dir) => PathBuf::from("."),
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

//! Path arguments: workspace containment, extension allow-lists, and the
//! workspace-relative form reported back to callers.

use crate::error::PolicyError;
use crate::level::SecurityConfig;
use std::path::{Component, Path, PathBuf};

/// Normalize `..` and `.` lexically, without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn explicitly_relative(arg: &str) -> bool {
    matches!(arg, "." | ".." | "~")
        || arg.starts_with("./")
        || arg.starts_with("../")
        || arg.starts_with("~/")
}

/// An argument is a path when it is written relative to `.`, `..` or `~`,
/// names an existing entry, or contains `/` and its parent directory exists.
/// Anything else is positional data such as a search pattern.
fn is_path_argument(arg: &str, resolved: &Path) -> bool {
    if arg.is_empty() || arg.starts_with('-') {
        return false;
    }
    explicitly_relative(arg)
        || resolved.exists()
        || (arg.contains('/') && resolved.parent().is_some_and(Path::exists))
}

fn resolve(workspace: &Path, arg: &str) -> PathBuf {
    let expanded = match arg.strip_prefix('~') {
        Some(rest) => {
            let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/"), PathBuf::from);
            home.join(rest.trim_start_matches('/'))
        }
        None => PathBuf::from(arg),
    };
    if expanded.is_absolute() {
        normalize(&expanded)
    } else {
        normalize(&workspace.join(expanded))
    }
}

/// Check every path-like argument and return them relative to `workspace`.
///
/// `workspace` must already be absolute and normalized. Paths outside the
/// workspace are rejected only when `path_restrictions` is on; otherwise they
/// are reported as given.
pub fn check_paths(
    workspace: &Path,
    config: &SecurityConfig,
    args: &[String],
) -> Result<Vec<String>, PolicyError> {
    let mut relative = Vec::new();
    for arg in args {
        let resolved = resolve(workspace, arg);
        if !is_path_argument(arg, &resolved) {
            continue;
        }

        let Ok(inside) = resolved.strip_prefix(workspace) else {
            if config.path_restrictions {
                return Err(PolicyError::PathOutsideWorkspace { path: arg.clone() });
            }
            relative.push(arg.clone());
            continue;
        };

        if let Some(extension) = resolved.extension().and_then(|e| e.to_str())
            && !config.extension_allowed(extension)
        {
            return Err(PolicyError::ExtensionNotAllowed {
                path: arg.clone(),
                extension: extension.to_owned(),
            });
        }

        if inside.as_os_str().is_empty() {
            relative.push(".".to_owned());
        } else {
            relative.push(inside.display().to_string());
        }
    }
    Ok(relative)
}

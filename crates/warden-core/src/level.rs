use crate::catalog::{ActiveCategories, Category};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Named bundle of policy defaults, from most to least restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    Strict,
    Balanced,
    #[default]
    Development,
    Permissive,
}

impl SecurityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "STRICT",
            Self::Balanced => "BALANCED",
            Self::Development => "DEVELOPMENT",
            Self::Permissive => "PERMISSIVE",
        }
    }

    /// Parse a level name, case-insensitively. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "balanced" => Some(Self::Balanced),
            "development" | "dev" => Some(Self::Development),
            "permissive" => Some(Self::Permissive),
            _ => None,
        }
    }

    /// Parse a level name, substituting `Development` for anything unrecognized.
    pub fn parse(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!(level = name, "unknown security level, using DEVELOPMENT");
            Self::Development
        })
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete policy derived from a [`SecurityLevel`].
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    pub level: SecurityLevel,
    pub require_consent: bool,
    pub active_categories: ActiveCategories,
    pub content_filtering: bool,
    pub path_restrictions: bool,
    /// `None` = any extension allowed.
    pub allowed_extensions: Option<BTreeSet<String>>,
    pub output_sanitization: bool,
}

const STRICT_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "toml", "yaml", "yml", "rs", "go", "py", "js", "ts", "jsx", "tsx", "css",
    "html", "lock", "log", "csv",
];

const BALANCED_EXTENSIONS: &[&str] = &[
    "sh", "sql", "xml", "ini", "cfg", "conf", "java", "kt", "c", "h", "cpp", "hpp", "rb", "php",
    "swift", "vue", "svelte", "scss", "svg", "mod", "sum", "mjs", "cjs",
];

fn extension_set(groups: &[&[&str]]) -> BTreeSet<String> {
    groups
        .iter()
        .flat_map(|g| g.iter())
        .map(|ext| (*ext).to_owned())
        .collect()
}

impl SecurityConfig {
    /// Resolve the policy for a level. Pure and total.
    pub fn resolve(level: SecurityLevel) -> Self {
        match level {
            SecurityLevel::Strict => Self {
                level,
                require_consent: false,
                active_categories: ActiveCategories::Only(vec![
                    Category::Filesystem,
                    Category::Search,
                ]),
                content_filtering: true,
                path_restrictions: true,
                allowed_extensions: Some(extension_set(&[STRICT_EXTENSIONS])),
                output_sanitization: true,
            },
            SecurityLevel::Balanced => Self {
                level,
                require_consent: false,
                active_categories: ActiveCategories::Only(vec![
                    Category::Filesystem,
                    Category::Search,
                    Category::Git,
                    Category::PackageManagers,
                    Category::Cargo,
                ]),
                content_filtering: true,
                path_restrictions: true,
                allowed_extensions: Some(extension_set(&[STRICT_EXTENSIONS, BALANCED_EXTENSIONS])),
                output_sanitization: true,
            },
            SecurityLevel::Development => Self {
                level,
                require_consent: true,
                active_categories: ActiveCategories::Only(vec![
                    Category::Filesystem,
                    Category::Search,
                    Category::PackageManagers,
                    Category::Git,
                    Category::Cargo,
                    Category::Go,
                    Category::Python,
                    Category::Node,
                ]),
                content_filtering: true,
                path_restrictions: true,
                allowed_extensions: None,
                output_sanitization: true,
            },
            SecurityLevel::Permissive => Self {
                level,
                require_consent: false,
                active_categories: ActiveCategories::All,
                content_filtering: false,
                path_restrictions: false,
                allowed_extensions: None,
                output_sanitization: false,
            },
        }
    }

    /// Override the level's content filtering default.
    #[must_use]
    pub fn with_content_filtering(mut self, enabled: bool) -> Self {
        self.content_filtering = enabled;
        self
    }

    pub fn extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .as_ref()
            .is_none_or(|set| set.contains(&extension.to_ascii_lowercase()))
    }
}

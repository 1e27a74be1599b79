//! Static catalog of command categories.
//!
//! Each category maps a command name to the argument tokens it may receive.
//! An empty allowed list means the command's arguments are not restricted at
//! all; it never means "no arguments allowed".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy for a single whitelisted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPolicy {
    pub name: &'static str,
    /// Allowed argument tokens. Empty = unrestricted.
    pub allowed_arguments: &'static [&'static str],
    /// Check every argument, not just dash-prefixed flags. Used for tools whose
    /// verbs (`up`, `commit`, `build`) are plain positional words.
    pub check_all_arguments: bool,
}

impl CommandPolicy {
    const fn flags(name: &'static str, allowed_arguments: &'static [&'static str]) -> Self {
        Self {
            name,
            allowed_arguments,
            check_all_arguments: false,
        }
    }

    const fn subcommands(name: &'static str, allowed_arguments: &'static [&'static str]) -> Self {
        Self {
            name,
            allowed_arguments,
            check_all_arguments: true,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed_arguments.is_empty()
    }

    pub fn allows(&self, argument: &str) -> bool {
        self.allowed_arguments.contains(&argument)
    }
}

/// Command categories, in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Filesystem,
    Search,
    PackageManagers,
    Git,
    Docker,
    Cargo,
    Go,
    Python,
    Node,
    BuildTools,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Filesystem,
        Category::Search,
        Category::PackageManagers,
        Category::Git,
        Category::Docker,
        Category::Cargo,
        Category::Go,
        Category::Python,
        Category::Node,
        Category::BuildTools,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "FILESYSTEM",
            Self::Search => "SEARCH",
            Self::PackageManagers => "PACKAGE_MANAGERS",
            Self::Git => "GIT",
            Self::Docker => "DOCKER",
            Self::Cargo => "CARGO",
            Self::Go => "GO",
            Self::Python => "PYTHON",
            Self::Node => "NODE",
            Self::BuildTools => "BUILD_TOOLS",
        }
    }

    pub fn commands(self) -> &'static [CommandPolicy] {
        match self {
            Self::Filesystem => FILESYSTEM,
            Self::Search => SEARCH,
            Self::PackageManagers => PACKAGE_MANAGERS,
            Self::Git => GIT,
            Self::Docker => DOCKER,
            Self::Cargo => CARGO,
            Self::Go => GO,
            Self::Python => PYTHON,
            Self::Node => NODE,
            Self::BuildTools => BUILD_TOOLS,
        }
    }

    pub fn find(self, command: &str) -> Option<&'static CommandPolicy> {
        self.commands().iter().find(|p| p.name == command)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which categories a security level activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveCategories {
    All,
    Only(Vec<Category>),
}

impl ActiveCategories {
    pub fn contains(&self, category: Category) -> bool {
        match self {
            Self::All => true,
            Self::Only(categories) => categories.contains(&category),
        }
    }

    /// Active categories in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(|c| self.contains(*c))
    }

    /// Find the first active category that whitelists `command`.
    pub fn lookup(&self, command: &str) -> Option<(Category, &'static CommandPolicy)> {
        self.iter()
            .find_map(|category| category.find(command).map(|policy| (category, policy)))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(Category::as_str).collect()
    }
}

const FILESYSTEM: &[CommandPolicy] = &[
    CommandPolicy::flags(
        "ls",
        &[
            "-l", "-a", "-la", "-al", "-lh", "-lah", "-R", "-1", "-h", "-t", "-r", "-S", "--all",
            "--color",
        ],
    ),
    CommandPolicy::flags("cat", &["-n", "-b", "-A", "-s"]),
    CommandPolicy::flags("head", &["-n", "-c", "-q"]),
    CommandPolicy::flags("tail", &["-n", "-c", "-q"]),
    CommandPolicy::flags("wc", &["-l", "-w", "-c", "-m"]),
    CommandPolicy::flags("tree", &["-L", "-a", "-d", "-I", "-f", "--gitignore"]),
    CommandPolicy::flags("stat", &["-c", "-f", "-L"]),
    CommandPolicy::flags("file", &["-b", "-i", "-L"]),
    CommandPolicy::flags("du", &["-h", "-s", "-d", "-c", "-sh", "--max-depth"]),
    CommandPolicy::flags("mkdir", &["-p", "-v"]),
    CommandPolicy::flags("cp", &["-r", "-R", "-v", "-n", "-p"]),
    CommandPolicy::flags("mv", &["-v", "-n", "-i"]),
    CommandPolicy::flags("rm", &["-r", "-f", "-rf", "-i", "-v"]),
    CommandPolicy::flags("rmdir", &["-p", "-v"]),
    CommandPolicy::flags("pwd", &[]),
    CommandPolicy::flags("echo", &[]),
    CommandPolicy::flags("touch", &[]),
];

const SEARCH: &[CommandPolicy] = &[
    CommandPolicy::flags(
        "grep",
        &[
            "-r", "-R", "-n", "-i", "-l", "-L", "-c", "-v", "-w", "-x", "-E", "-F", "-o", "-h",
            "-H", "-A", "-B", "-C", "-m", "-rn", "-rni", "--include", "--exclude",
            "--exclude-dir", "--color",
        ],
    ),
    CommandPolicy::flags(
        "rg",
        &[
            "-n", "-i", "-l", "-c", "-v", "-w", "-F", "-e", "-g", "-t", "-T", "-A", "-B", "-C",
            "-m", "--hidden", "--no-ignore", "--glob", "--type", "--json", "--files",
            "--max-count",
        ],
    ),
    CommandPolicy::flags(
        "find",
        &[
            "-name", "-iname", "-type", "-maxdepth", "-mindepth", "-path", "-not", "-size",
            "-mtime", "-newer", "-print",
        ],
    ),
    CommandPolicy::flags(
        "fd",
        &[
            "-e", "-t", "-H", "-I", "-d", "--hidden", "--type", "--extension", "--max-depth",
        ],
    ),
];

const PACKAGE_MANAGERS: &[CommandPolicy] = &[
    CommandPolicy::flags(
        "npm",
        &[
            "--save-dev", "-D", "--save-exact", "-E", "--production", "--silent", "--json",
            "--prefix", "--workspace", "-w", "--if-present",
        ],
    ),
    CommandPolicy::flags(
        "yarn",
        &["--dev", "-D", "--frozen-lockfile", "--silent", "--json", "--production"],
    ),
    CommandPolicy::flags(
        "pnpm",
        &["--save-dev", "-D", "--frozen-lockfile", "--filter", "--recursive", "-r", "--silent"],
    ),
    CommandPolicy::flags("npx", &["--yes", "-y", "--no-install", "--package", "-p"]),
];

const GIT: &[CommandPolicy] = &[CommandPolicy::subcommands(
    "git",
    &[
        "status", "log", "diff", "show", "branch", "checkout", "switch", "add", "commit", "push",
        "pull", "fetch", "merge", "rebase", "stash", "tag", "remote", "rev-parse", "ls-files",
        "blame", "init", "--oneline", "--stat", "--short", "-s", "-b", "-n", "-m", "-a", "-v",
        "--all", "--cached", "--staged", "--name-only", "--porcelain", "--graph", "--decorate",
        "--no-pager", "-p", "--patch", ".", "HEAD", "origin", "main", "master",
    ],
)];

const DOCKER: &[CommandPolicy] = &[
    CommandPolicy::subcommands(
        "docker",
        &[
            "ps", "images", "build", "run", "logs", "inspect", "version", "info", "pull", "stop",
            "start", "exec", "-a", "-q", "-t", "-d", "--rm", "-f", "--tail", "--format",
            "--no-cache", ".",
        ],
    ),
    CommandPolicy::subcommands(
        "docker-compose",
        &[
            "up", "down", "ps", "logs", "build", "config", "pull", "restart", "-d", "-f",
            "--build", "--remove-orphans", "--tail",
        ],
    ),
];

const CARGO: &[CommandPolicy] = &[
    CommandPolicy::subcommands(
        "cargo",
        &[
            "build", "check", "test", "run", "clippy", "fmt", "doc", "bench", "tree", "metadata",
            "clean", "update", "--release", "--all-features", "--no-default-features",
            "--features", "--workspace", "--all", "--all-targets", "--lib", "--bins", "--tests",
            "--examples", "--verbose", "-v", "-q", "--quiet", "--locked", "--offline", "-p",
            "--package", "--", "--check", "-D", "warnings", "--no-deps", "--format-version", "1",
        ],
    ),
    CommandPolicy::flags("rustc", &["--version", "-V", "--explain", "--edition"]),
    CommandPolicy::flags("rustfmt", &["--check", "--edition", "--emit"]),
];

const GO: &[CommandPolicy] = &[
    CommandPolicy::flags(
        "go",
        &["-v", "-race", "-cover", "-run", "-count", "-json", "-short", "-timeout"],
    ),
    CommandPolicy::flags("gofmt", &["-l", "-d", "-s"]),
];

const PYTHON: &[CommandPolicy] = &[
    CommandPolicy::flags("python", &["-m", "-V", "--version", "-u", "-B"]),
    CommandPolicy::flags("python3", &["-m", "-V", "--version", "-u", "-B"]),
    CommandPolicy::flags("pip", &["--version", "-r", "--user", "-q", "--quiet"]),
    CommandPolicy::flags(
        "pytest",
        &[
            "-v", "-q", "-x", "-k", "-s", "-m", "--tb", "--maxfail", "--co", "--collect-only",
        ],
    ),
];

const NODE: &[CommandPolicy] = &[
    CommandPolicy::flags("node", &["--version", "-v", "--test"]),
    CommandPolicy::flags(
        "tsc",
        &["--noEmit", "--project", "-p", "--pretty", "--version", "--listFiles"],
    ),
    CommandPolicy::flags(
        "eslint",
        &["--fix", "--ext", "--format", "-f", "--max-warnings", "--quiet", "-c", "--config"],
    ),
    CommandPolicy::flags(
        "prettier",
        &["--check", "--write", "-c", "-w", "--list-different", "-l", "--config"],
    ),
];

const BUILD_TOOLS: &[CommandPolicy] = &[
    CommandPolicy::flags("make", &["-j", "-n", "-C", "-f", "-k", "-s", "--dry-run"]),
    CommandPolicy::flags("cmake", &["-S", "-B", "--build", "-D", "-G", "--config"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_are_unique_across_categories() {
        let mut seen = std::collections::HashSet::new();
        for category in Category::ALL {
            for policy in category.commands() {
                assert!(
                    seen.insert(policy.name),
                    "{} listed twice (second time in {category})",
                    policy.name
                );
            }
        }
    }

    #[test]
    fn subcommand_style_tools_check_all_arguments() {
        for name in ["git", "cargo", "docker", "docker-compose"] {
            let (_, policy) = ActiveCategories::All.lookup(name).expect("in catalog");
            assert!(policy.check_all_arguments, "{name} should check all args");
        }
        let (_, grep) = ActiveCategories::All.lookup("grep").expect("in catalog");
        assert!(!grep.check_all_arguments);
    }

    #[test]
    fn lookup_respects_active_set() {
        let only_fs = ActiveCategories::Only(vec![Category::Filesystem]);
        assert!(only_fs.lookup("ls").is_some());
        assert!(only_fs.lookup("git").is_none());
        assert_eq!(
            ActiveCategories::All.lookup("git").map(|(c, _)| c),
            Some(Category::Git)
        );
    }

    #[test]
    fn bun_is_not_whitelisted_anywhere() {
        assert!(ActiveCategories::All.lookup("bun").is_none());
    }

    #[test]
    fn names_follow_catalog_order() {
        let active = ActiveCategories::Only(vec![Category::Git, Category::Filesystem]);
        assert_eq!(active.names(), vec!["FILESYSTEM", "GIT"]);
    }

    #[test]
    fn empty_allowed_list_is_unrestricted() {
        let echo = Category::Filesystem.find("echo").expect("echo listed");
        assert!(echo.is_unrestricted());
        let cat = Category::Filesystem.find("cat").expect("cat listed");
        assert!(!cat.is_unrestricted());
        assert!(cat.allows("-n"));
        assert!(!cat.allows("-z"));
    }
}

use std::time::Duration;
use warden_core::SecurityLevel;

pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 1024 * 1024; // 1 MiB
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for a [`Sandbox`](crate::Sandbox) instance.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOptions {
    pub security_level: SecurityLevel,
    pub enable_learning: bool,
    pub enable_auditing: bool,
    /// Overrides the level's content-filtering default when set.
    pub enable_content_filtering: Option<bool>,
    /// Cumulative stdout cap in bytes.
    pub max_output_size: usize,
    /// Wall-clock limit per command.
    pub timeout: Duration,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::Development,
            enable_learning: true,
            enable_auditing: true,
            enable_content_filtering: None,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Resource limits enforced by the process runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub max_output_size: usize,
    pub timeout: Duration,
}

impl From<&SandboxOptions> for RunLimits {
    fn from(options: &SandboxOptions) -> Self {
        Self {
            max_output_size: options.max_output_size,
            timeout: options.timeout,
        }
    }
}

/// Parse a byte size like "1m", "512k", "2g" or "4096".
pub fn parse_size(s: &str) -> anyhow::Result<usize> {
    let s = s.trim().to_ascii_lowercase();
    if s.is_empty() {
        anyhow::bail!("empty size");
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('g') {
        (n, 1024 * 1024 * 1024usize)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 1024 * 1024usize)
    } else if let Some(n) = s.strip_suffix('k') {
        (n, 1024usize)
    } else {
        (s.as_str(), 1usize)
    };

    let num: usize = num_str
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid size '{s}': {e}"))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("size '{s}' overflows"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_units() {
        assert_eq!(parse_size("4096").expect("valid"), 4096);
        assert_eq!(parse_size("512k").expect("valid"), 512 * 1024);
        assert_eq!(parse_size("1m").expect("valid"), 1024 * 1024);
        assert_eq!(parse_size("2G").expect("valid"), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_size(" 8 k ").expect("valid"), 8 * 1024);
    }

    #[test]
    fn parse_size_invalid() {
        assert!(parse_size("abc").is_err());
        assert!(parse_size("").is_err());
        assert!(parse_size("-1m").is_err());
    }

    #[test]
    fn default_options() {
        let options = SandboxOptions::default();
        assert_eq!(options.security_level, SecurityLevel::Development);
        assert!(options.enable_learning);
        assert!(options.enable_auditing);
        assert_eq!(options.enable_content_filtering, None);
        assert_eq!(RunLimits::from(&options).max_output_size, 1024 * 1024);
        assert_eq!(options.timeout, Duration::from_secs(30));
    }
}

//! Bounded in-memory audit trail of every execution attempt.

use crate::level::SecurityLevel;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

pub const AUDIT_CAPACITY: usize = 2000;

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub args_string: String,
    pub relative_paths: Vec<String>,
    pub success: bool,
    pub output_size: usize,
    pub error_message: Option<String>,
    pub security_level: SecurityLevel,
    pub category: Option<String>,
    pub is_learned: bool,
    /// Correlation id, not an integrity check.
    pub hash: String,
}

impl AuditLogEntry {
    /// Start an entry for an attempt; the outcome is filled in with
    /// [`succeeded`](Self::succeeded) or [`failed`](Self::failed).
    pub fn new(
        timestamp: DateTime<Utc>,
        command: &str,
        args: &[String],
        security_level: SecurityLevel,
    ) -> Self {
        let args_string = args.join(" ");
        let hash = entry_hash(command, &args_string, timestamp);
        Self {
            timestamp,
            command: command.to_owned(),
            args_string,
            relative_paths: Vec::new(),
            success: false,
            output_size: 0,
            error_message: None,
            security_level,
            category: None,
            is_learned: false,
            hash,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: Option<String>, is_learned: bool) -> Self {
        self.category = category;
        self.is_learned = is_learned;
        self
    }

    #[must_use]
    pub fn succeeded(mut self, relative_paths: Vec<String>, output_size: usize) -> Self {
        self.success = true;
        self.relative_paths = relative_paths;
        self.output_size = output_size;
        self
    }

    #[must_use]
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(message.into());
        self
    }
}

/// First 8 hex chars of SHA-256 over command, args and timestamp.
fn entry_hash(command: &str, args: &str, timestamp: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(command.as_bytes());
    hasher.update([0]);
    hasher.update(args.as_bytes());
    hasher.update([0]);
    hasher.update(
        timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .as_bytes(),
    );
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(8);
    digest
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total_commands: usize,
    /// Percentage with one decimal, e.g. `"87.5%"`.
    pub success_rate: String,
    pub learned_commands: usize,
    pub policy_commands: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSnapshot {
    pub entries: Vec<AuditLogEntry>,
    pub stats: AuditStats,
}

/// FIFO ring buffer. Entries are never mutated once recorded.
#[derive(Debug)]
pub struct AuditTrail {
    entries: VecDeque<AuditLogEntry>,
    capacity: usize,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::with_capacity(AUDIT_CAPACITY)
    }
}

impl AuditTrail {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(AUDIT_CAPACITY)),
            capacity,
        }
    }

    pub fn record(&mut self, entry: AuditLogEntry) {
        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `limit` entries, oldest first, plus stats over the
    /// whole buffer.
    pub fn snapshot(&self, limit: usize) -> AuditSnapshot {
        let skip = self.entries.len().saturating_sub(limit);
        AuditSnapshot {
            entries: self.entries.iter().skip(skip).cloned().collect(),
            stats: self.stats(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn stats(&self) -> AuditStats {
        let total = self.entries.len();
        let succeeded = self.entries.iter().filter(|e| e.success).count();
        let rate = if total == 0 {
            0.0
        } else {
            succeeded as f64 * 100.0 / total as f64
        };
        AuditStats {
            total_commands: total,
            success_rate: format!("{rate:.1}%"),
            learned_commands: self.entries.iter().filter(|e| e.is_learned).count(),
            policy_commands: self.entries.iter().filter(|e| e.category.is_some()).count(),
        }
    }
}

//! Learned commands and the consent cache.
//!
//! Learned commands are durable: they are written to
//! `<workspace>/.warden-learned.json` and survive the sandbox instance.
//! Consent records are in-memory and expire 24 hours after they are granted.

use crate::catalog::ActiveCategories;
use crate::traits::Clock;
use crate::types::signature;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of the learned-commands document, relative to the workspace root.
pub const LEARNED_FILE: &str = ".warden-learned.json";

const LEARNED_FILE_VERSION: u32 = 1;
const CONSENT_TTL_HOURS: i64 = 24;

/// A time-boxed approval for one exact command signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentRecord {
    pub granted: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConsentRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp < TimeDelta::hours(CONSENT_TTL_HOURS)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LearnedFile {
    version: u32,
    timestamp: DateTime<Utc>,
    commands: Vec<String>,
}

/// Snapshot of the trust store for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedStats {
    pub learning_enabled: bool,
    pub total_learned: usize,
    pub commands: Vec<String>,
    pub active_consents: usize,
    pub persistence_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct TrustStore {
    /// `None` when learning is disabled: nothing is loaded or written.
    path: Option<PathBuf>,
    active: ActiveCategories,
    learned: BTreeSet<String>,
    consents: HashMap<String, ConsentRecord>,
    clock: Arc<dyn Clock>,
}

impl TrustStore {
    /// Open the store for a workspace, loading learned commands best effort.
    pub fn open(
        workspace: &Path,
        active: ActiveCategories,
        enable_learning: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let path = enable_learning.then(|| workspace.join(LEARNED_FILE));
        let learned = path.as_deref().map(load_learned).unwrap_or_default();
        Self {
            path,
            active,
            learned,
            consents: HashMap::new(),
            clock,
        }
    }

    /// The consent record for this exact signature, if present and not expired.
    pub fn consent(&self, command: &str, args: &[String]) -> Option<ConsentRecord> {
        let now = self.clock.now();
        self.consents
            .get(&signature(command, args))
            .filter(|record| record.is_live(now))
            .copied()
    }

    pub fn is_consent_valid(&self, command: &str, args: &[String]) -> bool {
        self.consent(command, args).is_some()
    }

    /// Record approval for this signature. Commands outside the active catalog
    /// are also learned and persisted. Returns whether the command was newly
    /// learned.
    pub fn grant_consent(&mut self, command: &str, args: &[String]) -> bool {
        let key = signature(command, args);
        self.consents.insert(
            key.clone(),
            ConsentRecord {
                granted: true,
                timestamp: self.clock.now(),
            },
        );
        info!(operation = %key, "consent granted");

        if self.path.is_none() || self.active.lookup(command).is_some() {
            return false;
        }
        if !self.learned.insert(command.to_owned()) {
            return false;
        }
        info!(command, "command learned for workspace");
        self.persist();
        true
    }

    pub fn is_learned(&self, command: &str) -> bool {
        self.learned.contains(command)
    }

    /// Forget every learned command and every consent record.
    pub fn reset_learning(&mut self) {
        let learned = self.learned.len();
        let consents = self.consents.len();
        self.learned.clear();
        self.consents.clear();
        info!(learned, consents, "learning reset");
        self.persist();
    }

    pub fn stats(&self) -> LearnedStats {
        let now = self.clock.now();
        LearnedStats {
            learning_enabled: self.path.is_some(),
            total_learned: self.learned.len(),
            commands: self.learned.iter().cloned().collect(),
            active_consents: self.consents.values().filter(|r| r.is_live(now)).count(),
            persistence_path: self.path.clone(),
        }
    }

    /// Rewrite the learned-commands file. Failures are logged, never surfaced.
    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let document = LearnedFile {
            version: LEARNED_FILE_VERSION,
            timestamp: self.clock.now(),
            commands: self.learned.iter().cloned().collect(),
        };
        if let Err(e) = write_learned(path, &document) {
            warn!(path = %path.display(), error = %e, "failed to persist learned commands");
        }
    }
}

fn load_learned(path: &Path) -> BTreeSet<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read learned commands");
            return BTreeSet::new();
        }
    };
    match serde_json::from_str::<LearnedFile>(&content) {
        Ok(file) => {
            debug!(path = %path.display(), count = file.commands.len(), "loaded learned commands");
            file.commands.into_iter().collect()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt learned commands file");
            BTreeSet::new()
        }
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_learned(path: &Path, document: &LearnedFile) -> Result<()> {
    let content = serde_json::to_string_pretty(document)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename {} into place", tmp.display()))?;
    Ok(())
}

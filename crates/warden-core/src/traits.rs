//! Contracts between components. The process-spawning implementation lives
//! in `warden-sandbox`; fakes for tests live in [`crate::fakes`].

use crate::error::GuardError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Source of the current time. Consent expiry and audit timestamps read it.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Spawns an already-validated command and returns its stdout.
///
/// Implementations own their working directory and resource limits.
#[async_trait]
pub trait CommandRunner: Send + Sync + Debug {
    async fn run(&self, command: &str, args: &[String]) -> Result<String, GuardError>;
}

//! Fake implementations for testing.
#![allow(clippy::unwrap_used)]

use crate::error::GuardError;
use crate::traits::{Clock, CommandRunner};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// FakeClock
// ---------------------------------------------------------------------------

/// Manually advanced clock.
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Default for FakeClock {
    /// Starts at 2026-01-01T00:00:00Z.
    fn default() -> Self {
        Self::new(DateTime::from_timestamp(1_767_225_600, 0).unwrap())
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// FakeRunner
// ---------------------------------------------------------------------------

/// Runner that never spawns. Records every call and replays queued results,
/// falling back to a fixed output once the queue is empty.
#[derive(Debug)]
pub struct FakeRunner {
    default_output: String,
    queued: Mutex<VecDeque<Result<String, GuardError>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::with_output("ok")
    }

    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            default_output: output.into(),
            queued: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_result(&self, result: Result<String, GuardError>) {
        self.queued.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str, args: &[String]) -> Result<String, GuardError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_owned(), args.to_vec()));
        let queued = self.queued.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(self.default_output.clone()))
    }
}

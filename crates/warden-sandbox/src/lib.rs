//! Process execution for the Warden command sandbox.
//!
//! No kernel isolation: commands run as ordinary child processes behind the
//! policy checks in `warden-core`, with a fixed environment, a timeout and an
//! output cap.

pub mod policy;
pub mod runner;
pub mod sandbox;

pub use policy::{
    DEFAULT_MAX_OUTPUT_SIZE, DEFAULT_TIMEOUT, RunLimits, SandboxOptions, parse_size,
};
pub use runner::ProcessRunner;
pub use sandbox::Sandbox;
pub use warden_core::fakes;

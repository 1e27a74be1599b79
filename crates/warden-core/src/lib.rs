//! Policy engine for the Warden command sandbox: catalog, security levels,
//! trust store, validation, path checks, output sanitization and auditing.
//! Nothing in this crate spawns processes.

pub mod audit;
pub mod catalog;
pub mod error;
pub mod fakes;
pub mod level;
pub mod paths;
pub mod sanitize;
pub mod traits;
pub mod trust;
pub mod types;
pub mod validator;

pub use error::{GuardError, PolicyError};
pub use level::{SecurityConfig, SecurityLevel};
pub use traits::*;
pub use types::*;

//! Repository traits for the collaborators this crate depends on
//!
//! The services layer never touches storage directly; it goes through these
//! traits so a deployment can wire in its own user store and failure log, and
//! tests can substitute in-memory or fake-clock-driven implementations.

pub mod failure_log;
pub mod user;

pub use failure_log::{FailureLogRepository, FailureRecord, InMemoryFailureLog};
pub use user::{InMemoryUserRepository, UserRepository};

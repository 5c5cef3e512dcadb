//! Domain store boundary and its SQLite implementation.
//!
//! # Responsibility
//! - Define the read contract the notification engine depends on.
//! - Isolate SQL details from scheduling and notification building.
//!
//! # Invariants
//! - Reads return deterministic ordering so repeated scans of the same
//!   snapshot produce identical output.
//! - Transport failures surface as `RepoError::Db`, the retryable signal.

pub mod domain_store;

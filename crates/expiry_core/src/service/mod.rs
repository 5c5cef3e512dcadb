//! Expiry notification engine services.
//!
//! # Responsibility
//! - Classify expiring memberships against the checkpoint schedule.
//! - Resolve suppression policy and recipients.
//! - Build and return member and administrator notifications.
//!
//! # Invariants
//! - Services stay storage-agnostic; all reads go through `DomainStore`.
//! - Computation after the bulk read is pure for a given `now` day.

pub mod builder;
pub mod email;
pub mod expiry_task;
pub mod policy;
pub mod recipients;
pub mod schedule;

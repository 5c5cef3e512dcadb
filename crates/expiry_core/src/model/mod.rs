//! Domain model for time-bounded memberships and expiry reminders.
//!
//! # Responsibility
//! - Define membership snapshots read from the domain store.
//! - Define the notification shape handed to the external dispatcher.
//! - Define the typed per-resource reminder suppression policy.
//!
//! # Invariants
//! - Every model value is a transient snapshot; nothing here is persisted by
//!   the engine itself.
//! - A `Notification` always carries at least one recipient.

pub mod membership;
pub mod notification;
pub mod policy;

//! Expiry notification engine for time-bounded role and group memberships.
//!
//! Scans expiring memberships, decides per day-granularity checkpoint whether
//! a reminder is due, applies per-resource suppression and returns member and
//! administrator notifications for an external dispatcher to deliver.

pub mod cert;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cert::signer::{CertSignerConfig, CertSignerError, HttpCertSigner, Priority};
pub use config::{ConfigError, FlavorConfig, NotificationConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::membership::{
    Collection, CollectionKind, CollectionMember, MembershipRecord, ResourceKey, DAY_MS,
};
pub use model::notification::{Notification, NotificationEmail, NotificationMetric};
pub use model::policy::{SuppressionPolicy, DISABLE_REMINDER_TAG};
pub use repo::domain_store::{
    DomainStore, ExpiryWindow, RepoError, RepoResult, SqliteDomainStore,
};
pub use service::email::{EmailFormatter, PlainTextEmailFormatter};
pub use service::expiry_task::{current_epoch_ms, MemberExpiryTask, TaskError};
pub use service::schedule::{CheckpointSchedule, Classification, ScheduleEvaluator};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

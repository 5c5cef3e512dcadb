//! Membership expiry notification task.
//!
//! # Responsibility
//! - Drive one scan for one membership flavor: read, classify, apply
//!   suppression, resolve recipients, build notifications.
//! - Hand the complete notification list back to the caller for delivery.
//!
//! # Invariants
//! - A store failure aborts the invocation; partial lists are never returned.
//! - A malformed record or an unresolvable admin audience is skipped without
//!   affecting the rest of the batch.
//! - Output is a pure function of the store snapshot and the UTC day of
//!   `now`: member notifications in scan order, then one administrator
//!   notification per domain in domain-name order.

use crate::config::{FlavorConfig, NotificationConfig};
use crate::model::membership::CollectionKind;
use crate::model::notification::Notification;
use crate::repo::domain_store::{DomainStore, RepoError};
use crate::service::builder::{AdminAggregate, NotificationBuilder};
use crate::service::email::EmailFormatter;
use crate::service::policy::PolicyResolver;
use crate::service::recipients::{admin_recipients, member_recipients};
use crate::service::schedule::{CheckpointSchedule, ScheduleEvaluator};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Task-level failure.
#[derive(Debug)]
pub enum TaskError {
    Store(RepoError),
}

impl TaskError {
    /// Whether the dispatcher may retry the whole invocation later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
        }
    }
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "domain store failure: {err}"),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for TaskError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Expiry reminder task for role or group memberships.
pub struct MemberExpiryTask<S: DomainStore> {
    store: S,
    kind: CollectionKind,
    schedule: CheckpointSchedule,
    flavor: FlavorConfig,
    formatter: Arc<dyn EmailFormatter>,
    domain_filter: Option<String>,
}

impl<S: DomainStore> MemberExpiryTask<S> {
    pub fn new(
        store: S,
        kind: CollectionKind,
        config: &NotificationConfig,
        formatter: Arc<dyn EmailFormatter>,
    ) -> Self {
        Self {
            store,
            kind,
            schedule: config.schedule(),
            flavor: config.flavor(kind),
            formatter,
            domain_filter: None,
        }
    }

    /// Role-membership flavor.
    pub fn roles(
        store: S,
        config: &NotificationConfig,
        formatter: Arc<dyn EmailFormatter>,
    ) -> Self {
        Self::new(store, CollectionKind::Role, config, formatter)
    }

    /// Group-membership flavor.
    pub fn groups(
        store: S,
        config: &NotificationConfig,
        formatter: Arc<dyn EmailFormatter>,
    ) -> Self {
        Self::new(store, CollectionKind::Group, config, formatter)
    }

    /// Restricts scans to a single domain.
    pub fn with_domain_filter(mut self, domain_name: impl Into<String>) -> Self {
        self.domain_filter = Some(domain_name.into());
        self
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Computes notifications against the current wall-clock time.
    pub fn get_notifications(&self) -> Result<Vec<Notification>, TaskError> {
        self.get_notifications_at(current_epoch_ms())
    }

    /// Computes notifications for an explicit `now` (epoch milliseconds).
    pub fn get_notifications_at(&self, now_ms: i64) -> Result<Vec<Notification>, TaskError> {
        let started_at = Instant::now();
        info!(
            "event=expiry_scan module=service status=start kind={} domain_filter={}",
            self.kind,
            self.domain_filter.as_deref().unwrap_or("*")
        );

        match self.collect(now_ms) {
            Ok(notifications) => {
                info!(
                    "event=expiry_scan module=service status=ok kind={} notifications={} duration_ms={}",
                    self.kind,
                    notifications.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(notifications)
            }
            Err(err) => {
                error!(
                    "event=expiry_scan module=service status=error kind={} duration_ms={} retryable={} error={}",
                    self.kind,
                    started_at.elapsed().as_millis(),
                    err.is_retryable(),
                    err
                );
                Err(err)
            }
        }
    }

    fn collect(&self, now_ms: i64) -> Result<Vec<Notification>, TaskError> {
        let evaluator = ScheduleEvaluator::new(&self.schedule, now_ms);
        let builder =
            NotificationBuilder::new(self.kind, self.formatter.as_ref(), evaluator.reference_ms());
        let records = self.store.list_expiring_members(
            self.kind,
            self.domain_filter.as_deref(),
            &evaluator.scan_window(),
        )?;

        let mut policies = PolicyResolver::new(&self.store);
        let mut aggregates: BTreeMap<String, AdminAggregate> = BTreeMap::new();
        let mut notifications = Vec::new();

        for record in &records {
            if let Err(err) = record.validate() {
                warn!(
                    "event=expiry_record module=service status=skip kind={} domain={} {}={} reason={}",
                    self.kind, record.domain_name, self.kind, record.collection_name, err
                );
                continue;
            }

            let classification = evaluator.classify(record);
            let retained = classification.email_eligible
                || (classification.metrics_eligible && self.flavor.retain_non_checkpoint_metrics);
            if !retained {
                continue;
            }

            let policy = policies.resolve(&record.resource_key())?;
            if !policy.suppress_members() {
                if let Some(notification) = builder.member_notification(
                    record,
                    member_recipients(record),
                    &classification,
                ) {
                    notifications.push(notification);
                }
            }
            if !policy.suppress_admin() {
                let aggregate = aggregates
                    .entry(record.domain_name.clone())
                    .or_insert_with(|| builder.admin_aggregate(&record.domain_name));
                builder.contribute(aggregate, record, &classification);
            }
        }

        for (domain_name, aggregate) in aggregates {
            let Some(recipients) = admin_recipients(&self.store, &domain_name, now_ms)? else {
                warn!(
                    "event=expiry_admin module=service status=skip kind={} domain={} reason=admin_role_unresolved",
                    self.kind, domain_name
                );
                continue;
            };
            if let Some(notification) = builder.finish_admin(aggregate, recipients) {
                notifications.push(notification);
            }
        }

        Ok(notifications)
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn current_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

//! Notification assembly for member and administrator channels.
//!
//! # Responsibility
//! - Build one member notification per retained membership record.
//! - Accumulate one administrator aggregate per domain across all of the
//!   domain's non-suppressed resources.
//!
//! # Invariants
//! - `membersList` only ever holds checkpoint-eligible members, each once,
//!   in first-seen order, every name followed by `;`.
//! - An aggregate carries an email only when `membersList` is non-empty.

use crate::model::membership::{CollectionKind, MembershipRecord};
use crate::model::notification::{
    Notification, NotificationMetric, DETAIL_DAYS_UNTIL_EXPIRY, DETAIL_DOMAIN, DETAIL_EXPIRATION,
    DETAIL_MEMBER, DETAIL_MEMBERS_LIST,
};
use crate::service::email::EmailFormatter;
use crate::service::schedule::Classification;
use std::collections::{BTreeMap, BTreeSet};

const AUDIENCE_MEMBER: &str = "member";
const AUDIENCE_ADMIN: &str = "admin";

/// Builds notifications for one flavor and one evaluation day.
pub struct NotificationBuilder<'f> {
    kind: CollectionKind,
    formatter: &'f dyn EmailFormatter,
    reference_ms: i64,
}

impl<'f> NotificationBuilder<'f> {
    pub fn new(kind: CollectionKind, formatter: &'f dyn EmailFormatter, reference_ms: i64) -> Self {
        Self {
            kind,
            formatter,
            reference_ms,
        }
    }

    /// Builds the member-channel notification for one record.
    ///
    /// The email representation is attached only for checkpoint-eligible
    /// records.
    pub fn member_notification(
        &self,
        record: &MembershipRecord,
        recipients: BTreeSet<String>,
        classification: &Classification,
    ) -> Option<Notification> {
        let details = BTreeMap::from([
            (DETAIL_DOMAIN.to_string(), record.domain_name.clone()),
            (self.kind.as_str().to_string(), record.collection_name.clone()),
            (DETAIL_MEMBER.to_string(), record.member_name.clone()),
            (
                DETAIL_EXPIRATION.to_string(),
                record.expiration_ms.to_string(),
            ),
            (
                DETAIL_DAYS_UNTIL_EXPIRY.to_string(),
                classification.days_until_expiry.to_string(),
            ),
        ]);

        let mut metric = NotificationMetric::default();
        metric.push_record(self.metric_record(record, classification, AUDIENCE_MEMBER));

        let email = classification
            .email_eligible
            .then(|| self.formatter.member_email(self.kind, &details));
        let notification = Notification::new(recipients, details, metric)?;
        Some(match email {
            Some(email) => notification.with_email(email),
            None => notification,
        })
    }

    /// Starts an empty administrator aggregate for `domain_name`.
    pub fn admin_aggregate(&self, domain_name: &str) -> AdminAggregate {
        AdminAggregate {
            domain_name: domain_name.to_string(),
            members: Vec::new(),
            seen_members: BTreeSet::new(),
            resources: Vec::new(),
            metric: NotificationMetric::default(),
        }
    }

    /// Records one membership's contribution to its domain aggregate.
    pub fn contribute(
        &self,
        aggregate: &mut AdminAggregate,
        record: &MembershipRecord,
        classification: &Classification,
    ) {
        if !aggregate.resources.contains(&record.collection_name) {
            aggregate.resources.push(record.collection_name.clone());
        }
        if classification.email_eligible
            && aggregate.seen_members.insert(record.member_name.clone())
        {
            aggregate.members.push(record.member_name.clone());
        }
        aggregate
            .metric
            .push_record(self.metric_record(record, classification, AUDIENCE_ADMIN));
    }

    /// Finalizes an aggregate into the domain's administrator notification.
    ///
    /// Returns `None` when there are no recipients or nothing was contributed.
    pub fn finish_admin(
        &self,
        aggregate: AdminAggregate,
        recipients: BTreeSet<String>,
    ) -> Option<Notification> {
        if aggregate.is_empty() {
            return None;
        }

        let members_list = aggregate.members_list();
        let resources_list = join_terminated(&aggregate.resources);
        let details = BTreeMap::from([
            (DETAIL_DOMAIN.to_string(), aggregate.domain_name),
            (DETAIL_MEMBERS_LIST.to_string(), members_list),
            (self.kind.resource_list_key().to_string(), resources_list),
        ]);

        let email = (!aggregate.members.is_empty())
            .then(|| self.formatter.admin_email(self.kind, &details));
        let notification = Notification::new(recipients, details, aggregate.metric)?;
        Some(match email {
            Some(email) => notification.with_email(email),
            None => notification,
        })
    }

    fn metric_record(
        &self,
        record: &MembershipRecord,
        classification: &Classification,
        audience: &str,
    ) -> Vec<(String, String)> {
        vec![
            ("notif_type".to_string(), self.kind.metric_type().to_string()),
            ("audience".to_string(), audience.to_string()),
            ("domain".to_string(), record.domain_name.clone()),
            (self.kind.as_str().to_string(), record.collection_name.clone()),
            ("member".to_string(), record.member_name.clone()),
            (
                "expiry_days".to_string(),
                classification.days_until_expiry.to_string(),
            ),
            ("expiry_ms".to_string(), record.expiration_ms.to_string()),
            ("timestamp".to_string(), self.reference_ms.to_string()),
        ]
    }
}

/// Per-domain accumulator for the administrator reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAggregate {
    domain_name: String,
    members: Vec<String>,
    seen_members: BTreeSet<String>,
    resources: Vec<String>,
    metric: NotificationMetric,
}

impl AdminAggregate {
    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// Semicolon-terminated checkpoint-eligible member names.
    pub fn members_list(&self) -> String {
        join_terminated(&self.members)
    }

    pub fn is_empty(&self) -> bool {
        self.metric.is_empty()
    }
}

fn join_terminated(values: &[String]) -> String {
    values.iter().map(|value| format!("{value};")).collect()
}

#[cfg(test)]
mod tests {
    use super::NotificationBuilder;
    use crate::model::membership::{CollectionKind, MembershipRecord};
    use crate::service::email::PlainTextEmailFormatter;
    use crate::service::schedule::Classification;
    use std::collections::BTreeSet;

    fn record(collection: &str, member: &str) -> MembershipRecord {
        MembershipRecord {
            domain_name: "sports".to_string(),
            kind: CollectionKind::Group,
            collection_name: collection.to_string(),
            member_name: member.to_string(),
            expiration_ms: 1_000,
        }
    }

    fn classification(days: i64, email: bool) -> Classification {
        Classification {
            days_until_expiry: days,
            email_eligible: email,
            metrics_eligible: true,
        }
    }

    fn admins() -> BTreeSet<String> {
        BTreeSet::from(["user.admin".to_string()])
    }

    #[test]
    fn aggregate_merges_resources_and_dedupes_members() {
        let formatter = PlainTextEmailFormatter;
        let builder = NotificationBuilder::new(CollectionKind::Group, &formatter, 0);
        let mut aggregate = builder.admin_aggregate("sports");

        builder.contribute(&mut aggregate, &record("devs", "user.b"), &classification(0, true));
        builder.contribute(&mut aggregate, &record("devs", "user.c"), &classification(3, false));
        builder.contribute(&mut aggregate, &record("ops", "user.a"), &classification(7, true));
        builder.contribute(&mut aggregate, &record("ops", "user.b"), &classification(7, true));
        assert_eq!(aggregate.members_list(), "user.b;user.a;");

        let notification = builder.finish_admin(aggregate, admins()).unwrap();
        assert_eq!(notification.detail("groupsList"), Some("devs;ops;"));
        assert_eq!(notification.detail("membersList"), Some("user.b;user.a;"));
        assert_eq!(notification.metric().len(), 4);
        assert!(notification.email().is_some());
    }

    #[test]
    fn aggregate_without_checkpoint_members_is_metrics_only() {
        let formatter = PlainTextEmailFormatter;
        let builder = NotificationBuilder::new(CollectionKind::Role, &formatter, 0);
        let mut aggregate = builder.admin_aggregate("sports");
        builder.contribute(&mut aggregate, &record("devs", "user.c"), &classification(3, false));

        let notification = builder.finish_admin(aggregate, admins()).unwrap();
        assert_eq!(notification.detail("membersList"), Some(""));
        assert!(notification.email().is_none());
        assert_eq!(notification.metric().len(), 1);
    }

    #[test]
    fn empty_aggregate_or_recipients_are_omitted() {
        let formatter = PlainTextEmailFormatter;
        let builder = NotificationBuilder::new(CollectionKind::Role, &formatter, 0);
        assert!(builder
            .finish_admin(builder.admin_aggregate("sports"), admins())
            .is_none());

        let mut aggregate = builder.admin_aggregate("sports");
        builder.contribute(&mut aggregate, &record("devs", "user.c"), &classification(0, true));
        assert!(builder.finish_admin(aggregate, BTreeSet::new()).is_none());
    }

    #[test]
    fn member_notification_attaches_email_only_at_checkpoints() {
        let formatter = PlainTextEmailFormatter;
        let builder = NotificationBuilder::new(CollectionKind::Role, &formatter, 0);
        let recipients = BTreeSet::from(["user.c".to_string()]);

        let at_checkpoint = builder
            .member_notification(
                &record("devs", "user.c"),
                recipients.clone(),
                &classification(7, true),
            )
            .unwrap();
        assert!(at_checkpoint.email().is_some());
        assert_eq!(at_checkpoint.detail("daysUntilExpiry"), Some("7"));

        let off_checkpoint = builder
            .member_notification(
                &record("devs", "user.c"),
                recipients,
                &classification(6, false),
            )
            .unwrap();
        assert!(off_checkpoint.email().is_none());
        assert_eq!(off_checkpoint.metric().len(), 1);
    }
}

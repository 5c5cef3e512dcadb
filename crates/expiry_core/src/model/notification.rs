//! Notification shape handed to the delivery dispatcher.
//!
//! # Invariants
//! - Recipients are never empty; construction returns `None` instead.
//! - The metrics representation is always present; the email representation
//!   only when the email channel's triggering rule was satisfied.
//! - Recipient and detail collections are ordered so that serialized output
//!   is byte-stable for identical inputs.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Detail key carrying the semicolon-terminated member list of an admin
/// aggregate.
pub const DETAIL_MEMBERS_LIST: &str = "membersList";
pub const DETAIL_DOMAIN: &str = "domain";
pub const DETAIL_MEMBER: &str = "member";
pub const DETAIL_EXPIRATION: &str = "expiration";
pub const DETAIL_DAYS_UNTIL_EXPIRY: &str = "daysUntilExpiry";

/// Human-readable representation of a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEmail {
    pub subject: String,
    pub body: String,
}

/// Machine-consumable representation of a reminder.
///
/// Holds one attribute record per expiring membership the notification
/// covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationMetric {
    pub attributes: Vec<Vec<(String, String)>>,
}

impl NotificationMetric {
    pub fn push_record(&mut self, record: Vec<(String, String)>) {
        self.attributes.push(record);
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// One reminder addressed to a member or to a domain's administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    recipients: BTreeSet<String>,
    details: BTreeMap<String, String>,
    email: Option<NotificationEmail>,
    metric: NotificationMetric,
}

impl Notification {
    /// Creates a metrics-only notification.
    ///
    /// Returns `None` when `recipients` is empty.
    pub fn new(
        recipients: BTreeSet<String>,
        details: BTreeMap<String, String>,
        metric: NotificationMetric,
    ) -> Option<Self> {
        if recipients.is_empty() {
            return None;
        }
        Some(Self {
            recipients,
            details,
            email: None,
            metric,
        })
    }

    /// Attaches the email representation.
    pub fn with_email(mut self, email: NotificationEmail) -> Self {
        self.email = Some(email);
        self
    }

    pub fn recipients(&self) -> &BTreeSet<String> {
        &self.recipients
    }

    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }

    pub fn email(&self) -> Option<&NotificationEmail> {
        self.email.as_ref()
    }

    pub fn metric(&self) -> &NotificationMetric {
        &self.metric
    }
}

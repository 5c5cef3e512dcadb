//! Email rendering for expiry reminders.
//!
//! # Responsibility
//! - Turn notification details into a human-readable email representation.
//!
//! # Invariants
//! - Formatters are stateless; the same details always render the same email.

use crate::model::membership::CollectionKind;
use crate::model::notification::{
    NotificationEmail, DETAIL_DAYS_UNTIL_EXPIRY, DETAIL_DOMAIN, DETAIL_EXPIRATION, DETAIL_MEMBER,
    DETAIL_MEMBERS_LIST,
};
use std::collections::BTreeMap;

/// Injectable email rendering service shared by role and group tasks.
pub trait EmailFormatter: Send + Sync {
    /// Renders the reminder sent to an expiring member.
    fn member_email(
        &self,
        kind: CollectionKind,
        details: &BTreeMap<String, String>,
    ) -> NotificationEmail;

    /// Renders the aggregated reminder sent to a domain's administrators.
    fn admin_email(
        &self,
        kind: CollectionKind,
        details: &BTreeMap<String, String>,
    ) -> NotificationEmail;
}

/// Default plain-text formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextEmailFormatter;

impl EmailFormatter for PlainTextEmailFormatter {
    fn member_email(
        &self,
        kind: CollectionKind,
        details: &BTreeMap<String, String>,
    ) -> NotificationEmail {
        let domain = detail(details, DETAIL_DOMAIN);
        let collection = detail(details, kind.as_str());
        let days = detail(details, DETAIL_DAYS_UNTIL_EXPIRY);
        NotificationEmail {
            subject: format!("{} Member Expiration Reminder", title_case(kind)),
            body: format!(
                "Your membership in {kind} {domain}:{kind}.{collection} expires in {days} day(s) \
                 (expiration {expiration} ms since epoch). Contact the domain administrators \
                 to extend it before access is revoked.\nMember: {member}\n",
                expiration = detail(details, DETAIL_EXPIRATION),
                member = detail(details, DETAIL_MEMBER),
            ),
        }
    }

    fn admin_email(
        &self,
        kind: CollectionKind,
        details: &BTreeMap<String, String>,
    ) -> NotificationEmail {
        let domain = detail(details, DETAIL_DOMAIN);
        let members = detail(details, DETAIL_MEMBERS_LIST)
            .split_terminator(';')
            .map(|member| format!("  - {member}\n"))
            .collect::<String>();
        let resources = detail(details, kind.resource_list_key())
            .split_terminator(';')
            .collect::<Vec<_>>()
            .join(", ");
        NotificationEmail {
            subject: format!("{} Member Expiration Reminder: {domain}", title_case(kind)),
            body: format!(
                "The following {kind} members in domain {domain} are about to expire \
                 ({kind}s: {resources}):\n{members}"
            ),
        }
    }
}

fn detail<'a>(details: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    details.get(key).map(String::as_str).unwrap_or("")
}

fn title_case(kind: CollectionKind) -> &'static str {
    match kind {
        CollectionKind::Role => "Role",
        CollectionKind::Group => "Group",
    }
}

//! Recipient resolution for member and administrator reminders.

use crate::model::membership::MembershipRecord;
use crate::repo::domain_store::{DomainStore, RepoResult};
use std::collections::BTreeSet;

/// Recipient set of a member-channel reminder: the member itself.
pub fn member_recipients(record: &MembershipRecord) -> BTreeSet<String> {
    BTreeSet::from([record.member_name.clone()])
}

/// Recipient set of a domain's administrator reminder, as of `now_ms`.
///
/// Returns `Ok(None)` when the administrator role cannot be resolved or has
/// no members; callers skip the aggregate in that case.
pub fn admin_recipients<S: DomainStore + ?Sized>(
    store: &S,
    domain_name: &str,
    now_ms: i64,
) -> RepoResult<Option<BTreeSet<String>>> {
    let admins = store
        .get_administrators(domain_name, now_ms)?
        .map(|admins| admins.into_iter().collect::<BTreeSet<_>>())
        .filter(|admins| !admins.is_empty());
    Ok(admins)
}

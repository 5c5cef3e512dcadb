//! Per-resource suppression policy resolution.
//!
//! Tags are fetched at most once per role or group for one scan; every
//! record of that resource shares the resolved policy.

use crate::model::membership::ResourceKey;
use crate::model::policy::SuppressionPolicy;
use crate::repo::domain_store::{DomainStore, RepoResult};
use log::debug;
use std::collections::HashMap;

/// Memoizing resolver scoped to one task invocation.
pub struct PolicyResolver<'s, S: DomainStore + ?Sized> {
    store: &'s S,
    resolved: HashMap<ResourceKey, SuppressionPolicy>,
}

impl<'s, S: DomainStore + ?Sized> PolicyResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            resolved: HashMap::new(),
        }
    }

    /// Returns the suppression policy for `resource`.
    ///
    /// Store failures propagate; malformed tag values resolve to
    /// `SuppressionPolicy::None`.
    pub fn resolve(&mut self, resource: &ResourceKey) -> RepoResult<SuppressionPolicy> {
        if let Some(policy) = self.resolved.get(resource) {
            return Ok(*policy);
        }

        let tags =
            self.store
                .get_resource_tags(&resource.domain_name, resource.kind, &resource.name)?;
        let policy = SuppressionPolicy::from_tags(&tags);
        if policy != SuppressionPolicy::None {
            debug!(
                "event=policy_resolve module=service status=ok domain={} {}={} suppression={}",
                resource.domain_name,
                resource.kind,
                resource.name,
                policy.bits()
            );
        }
        self.resolved.insert(resource.clone(), policy);
        Ok(policy)
    }
}

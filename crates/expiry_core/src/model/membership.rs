//! Membership records and role/group collection shapes.
//!
//! # Invariants
//! - A `MembershipRecord` always carries an expiration; memberships without
//!   one never reach the notification engine.
//! - Member names must match the principal naming rule before a record is
//!   used for recipient resolution.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Milliseconds in one scheduling day.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

static PRINCIPAL_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_*][A-Za-z0-9_*:.\-]*$").expect("valid principal name regex")
});

/// Membership flavor: the kind of collection a member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Role,
    Group,
}

impl CollectionKind {
    /// Stable storage/detail value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Group => "group",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "role" => Some(Self::Role),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    /// Detail key listing contributing resources in an admin aggregate.
    pub fn resource_list_key(self) -> &'static str {
        match self {
            Self::Role => "rolesList",
            Self::Group => "groupsList",
        }
    }

    /// Metric record type for this flavor.
    pub fn metric_type(self) -> &'static str {
        match self {
            Self::Role => "role_membership_expiry",
            Self::Group => "group_membership_expiry",
        }
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one role or group inside a domain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    pub domain_name: String,
    pub kind: CollectionKind,
    pub name: String,
}

/// Point-in-time snapshot of one expiring membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipRecord {
    pub domain_name: String,
    pub kind: CollectionKind,
    pub collection_name: String,
    pub member_name: String,
    /// Unix epoch milliseconds.
    pub expiration_ms: i64,
}

impl MembershipRecord {
    /// Validates fields required for recipient resolution.
    pub fn validate(&self) -> Result<(), MembershipValidationError> {
        if self.domain_name.trim().is_empty() {
            return Err(MembershipValidationError::EmptyDomain);
        }
        if self.collection_name.trim().is_empty() {
            return Err(MembershipValidationError::EmptyCollection);
        }
        if !is_valid_principal_name(&self.member_name) {
            return Err(MembershipValidationError::InvalidMemberName(
                self.member_name.clone(),
            ));
        }
        Ok(())
    }

    pub fn resource_key(&self) -> ResourceKey {
        ResourceKey {
            domain_name: self.domain_name.clone(),
            kind: self.kind,
            name: self.collection_name.clone(),
        }
    }
}

/// Validation failures for membership snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipValidationError {
    EmptyDomain,
    EmptyCollection,
    InvalidMemberName(String),
}

impl Display for MembershipValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDomain => write!(f, "membership domain name is empty"),
            Self::EmptyCollection => write!(f, "membership collection name is empty"),
            Self::InvalidMemberName(name) => write!(f, "invalid member name: `{name}`"),
        }
    }
}

impl Error for MembershipValidationError {}

/// One member entry of a role or group, as written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMember {
    pub name: String,
    /// Unix epoch milliseconds. `None` for a permanent membership.
    pub expiration_ms: Option<i64>,
}

impl CollectionMember {
    pub fn permanent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expiration_ms: None,
        }
    }

    pub fn expiring(name: impl Into<String>, expiration_ms: i64) -> Self {
        Self {
            name: name.into(),
            expiration_ms: Some(expiration_ms),
        }
    }
}

/// Full write model for one role or group.
///
/// Tags are free-form resource metadata; reminder suppression is read from
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub domain_name: String,
    pub kind: CollectionKind,
    pub name: String,
    pub members: Vec<CollectionMember>,
    pub tags: BTreeMap<String, Vec<String>>,
}

impl Collection {
    pub fn new(
        domain_name: impl Into<String>,
        kind: CollectionKind,
        name: impl Into<String>,
    ) -> Self {
        Self {
            domain_name: domain_name.into(),
            kind,
            name: name.into(),
            members: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_members(mut self, members: Vec<CollectionMember>) -> Self {
        self.members = members;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.tags.insert(key.into(), values);
        self
    }
}

/// Returns whether `name` is a well-formed principal identifier.
pub fn is_valid_principal_name(name: &str) -> bool {
    PRINCIPAL_NAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::{
        is_valid_principal_name, CollectionKind, MembershipRecord, MembershipValidationError,
    };

    fn record(member: &str) -> MembershipRecord {
        MembershipRecord {
            domain_name: "sports".to_string(),
            kind: CollectionKind::Role,
            collection_name: "readers".to_string(),
            member_name: member.to_string(),
            expiration_ms: 0,
        }
    }

    #[test]
    fn principal_names_accept_user_service_and_group_forms() {
        assert!(is_valid_principal_name("user.joe"));
        assert!(is_valid_principal_name("sports.api"));
        assert!(is_valid_principal_name("sports:group.dev-team"));
        assert!(!is_valid_principal_name(""));
        assert!(!is_valid_principal_name("user joe"));
        assert!(!is_valid_principal_name(".leading"));
    }

    #[test]
    fn validate_rejects_blank_member() {
        let err = record("  ").validate().unwrap_err();
        assert!(matches!(err, MembershipValidationError::InvalidMemberName(_)));
        assert!(record("user.jane").validate().is_ok());
    }

    #[test]
    fn kind_parse_matches_as_str() {
        for kind in [CollectionKind::Role, CollectionKind::Group] {
            assert_eq!(CollectionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CollectionKind::parse("policy"), None);
    }
}

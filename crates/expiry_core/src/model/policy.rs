//! Per-resource reminder suppression policy.
//!
//! The policy is read from the `zms.DisableReminderNotifications` tag of a
//! role or group. Its single value is a small integer bitmask:
//! bit 0 suppresses member reminders, bit 1 suppresses the administrator
//! reminder.
//!
//! # Invariants
//! - Missing, malformed, multi-valued or out-of-range tag values collapse to
//!   `SuppressionPolicy::None`; parsing never fails.

use std::collections::BTreeMap;
use std::ops::BitOr;

/// Tag key holding the suppression bitmask.
pub const DISABLE_REMINDER_TAG: &str = "zms.DisableReminderNotifications";

const MEMBERS_BIT: u8 = 0b01;
const ADMIN_BIT: u8 = 0b10;

/// Typed suppression bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SuppressionPolicy {
    #[default]
    None = 0,
    SuppressMembers = 1,
    SuppressAdmin = 2,
    SuppressAll = 3,
}

impl SuppressionPolicy {
    /// Builds a policy from raw bits; values above 3 collapse to `None`.
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::SuppressMembers,
            2 => Self::SuppressAdmin,
            3 => Self::SuppressAll,
            _ => Self::None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Parses one textual tag value.
    pub fn parse(value: &str) -> Self {
        value
            .trim()
            .parse::<u8>()
            .map(Self::from_bits)
            .unwrap_or_default()
    }

    /// Resolves the policy from a resource's tag map.
    pub fn from_tags(tags: &BTreeMap<String, Vec<String>>) -> Self {
        match tags.get(DISABLE_REMINDER_TAG).map(Vec::as_slice) {
            Some([value]) => Self::parse(value),
            _ => Self::None,
        }
    }

    pub fn suppress_members(self) -> bool {
        self.bits() & MEMBERS_BIT != 0
    }

    pub fn suppress_admin(self) -> bool {
        self.bits() & ADMIN_BIT != 0
    }
}

impl BitOr for SuppressionPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.bits() | rhs.bits())
    }
}

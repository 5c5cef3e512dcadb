//! Deployment configuration for the expiry notification tasks.
//!
//! # Responsibility
//! - Deserialize checkpoint schedule and per-flavor retention knobs.
//! - Validate declaration-level invariants before any scan runs.
//!
//! # Invariants
//! - Every field has a default, so `{}` is a valid configuration.
//! - Checkpoints are read-only once a task is constructed.

use crate::model::membership::CollectionKind;
use crate::repo::domain_store::DEFAULT_ADMIN_ROLE;
use crate::service::schedule::CheckpointSchedule;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Largest accepted checkpoint, in days.
pub const MAX_CHECKPOINT_DAYS: u32 = 365;

const DEFAULT_CHECKPOINTS: &[u32] = &[0, 1, 7, 14, 21, 28];

/// Per membership flavor knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlavorConfig {
    /// Keep metrics-only notifications for members outside the checkpoints.
    pub retain_non_checkpoint_metrics: bool,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationConfig {
    pub checkpoints: Vec<u32>,
    pub admin_role: String,
    pub role: FlavorConfig,
    pub group: FlavorConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            checkpoints: DEFAULT_CHECKPOINTS.to_vec(),
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
            role: FlavorConfig {
                retain_non_checkpoint_metrics: true,
            },
            group: FlavorConfig {
                retain_non_checkpoint_metrics: false,
            },
        }
    }
}

impl NotificationConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            source: err,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checkpoints.is_empty() {
            return Err(ConfigError::EmptyCheckpoints);
        }
        if let Some(&days) = self
            .checkpoints
            .iter()
            .find(|&&days| days > MAX_CHECKPOINT_DAYS)
        {
            return Err(ConfigError::CheckpointOutOfRange(days));
        }
        if self.admin_role.trim().is_empty() {
            return Err(ConfigError::EmptyAdminRole);
        }
        Ok(())
    }

    /// Normalized checkpoint set.
    pub fn schedule(&self) -> CheckpointSchedule {
        CheckpointSchedule::new(self.checkpoints.iter().copied())
    }

    pub fn flavor(&self, kind: CollectionKind) -> FlavorConfig {
        match kind {
            CollectionKind::Role => self.role,
            CollectionKind::Group => self.group,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    EmptyCheckpoints,
    CheckpointOutOfRange(u32),
    EmptyAdminRole,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read config `{path}`: {source}"),
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::EmptyCheckpoints => write!(f, "checkpoints cannot be empty"),
            Self::CheckpointOutOfRange(days) => write!(
                f,
                "checkpoint {days} exceeds maximum of {MAX_CHECKPOINT_DAYS} days"
            ),
            Self::EmptyAdminRole => write!(f, "admin_role cannot be empty"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}
